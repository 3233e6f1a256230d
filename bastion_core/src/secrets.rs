//! Symmetric encryption for secrets at rest (currently the TOTP secret).
//!
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext; the
//! whole blob travels base64-encoded so it fits a text column.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use crate::error::CoreError;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct SecretBox {
  cipher: Aes256Gcm,
}

impl SecretBox {
  /// Key must be exactly 32 bytes, provided base64-encoded in configuration
  pub fn from_base64_key(key_b64: &str) -> Result<Self, CoreError> {
    let key_bytes = B64
      .decode(key_b64.trim())
      .map_err(|_| CoreError::Internal("secret key is not valid base64".to_string()))?;
    if key_bytes.len() != 32 {
      return Err(CoreError::Internal(format!(
        "secret key must be 32 bytes, got {}",
        key_bytes.len()
      )));
    }

    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    Ok(Self {
      cipher: Aes256Gcm::new(key),
    })
  }

  pub fn seal(&self, plaintext: &str) -> Result<String, CoreError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = self
      .cipher
      .encrypt(&nonce, plaintext.as_bytes())
      .map_err(|_| CoreError::Internal("encryption failed".to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(B64.encode(blob))
  }

  pub fn open(&self, sealed: &str) -> Result<String, CoreError> {
    let blob = B64
      .decode(sealed.trim())
      .map_err(|_| CoreError::Internal("sealed secret is not valid base64".to_string()))?;
    if blob.len() <= NONCE_LEN {
      return Err(CoreError::Internal("sealed secret is truncated".to_string()));
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let plaintext = self
      .cipher
      .decrypt(Nonce::from_slice(nonce), ciphertext)
      .map_err(|_| CoreError::Internal("decryption failed".to_string()))?;

    String::from_utf8(plaintext)
      .map_err(|_| CoreError::Internal("decrypted secret is not UTF-8".to_string()))
  }
}
