//! TOTP and recovery-code primitives for multi-factor authentication.
//!
//! TOTP parameters are the interoperable defaults: SHA-1, 6 digits, 30 s
//! period, one step of clock skew in either direction. Recovery codes are
//! compared through SHA-256 digests of their normalized form so the plain
//! codes are only ever seen once, at generation time.

use data_encoding::{BASE32, BASE32_NOPAD};
use rand::Rng;
use sha2::{Digest, Sha256};
use totp_lite::{totp_custom, Sha1};

use crate::error::CoreError;

pub const TOTP_PERIOD: u64 = 30;
pub const TOTP_DIGITS: u32 = 6;
const TOTP_SKEW_STEPS: i64 = 1;

pub const RECOVERY_CODE_COUNT: usize = 10;
const RECOVERY_CODE_GROUP_LEN: usize = 5;
const RECOVERY_CODE_GROUPS: usize = 2;

/// Mint a fresh Base32 TOTP secret (160 bits, per the authenticator custom)
pub fn generate_totp_secret() -> String {
  let mut secret = [0u8; 20];
  rand::thread_rng().fill(&mut secret);
  BASE32_NOPAD.encode(&secret)
}

fn decode_totp_secret(secret: &str) -> Result<Vec<u8>, CoreError> {
  let normalized = secret.trim().to_uppercase();
  BASE32_NOPAD
    .decode(normalized.as_bytes())
    .or_else(|_| BASE32.decode(normalized.as_bytes()))
    .map_err(|_| CoreError::Internal("stored TOTP secret is not valid Base32".to_string()))
}

/// Check a 6-digit code against the secret at `now` (epoch seconds),
/// accepting one period of skew either way.
pub fn validate_totp(secret: &str, code: &str, now: u64) -> Result<bool, CoreError> {
  let code = code.trim();
  if code.len() != TOTP_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
    return Ok(false);
  }

  let key = decode_totp_secret(secret)?;
  for step in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
    let offset = step * TOTP_PERIOD as i64;
    let Some(time) = now.checked_add_signed(offset) else {
      continue;
    };
    if totp_custom::<Sha1>(TOTP_PERIOD, TOTP_DIGITS, &key, time) == code {
      return Ok(true);
    }
  }
  Ok(false)
}

/// Provisioning URI consumed by authenticator apps
pub fn otpauth_uri(issuer: &str, account: &str, secret: &str) -> String {
  format!(
    "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={TOTP_DIGITS}&period={TOTP_PERIOD}"
  )
}

/// Generate the recovery code set: ten codes shaped `XXXXX-XXXXX`
/// over the Base32 alphabet.
pub fn generate_recovery_codes() -> Vec<String> {
  let alphabet: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
  let mut rng = rand::thread_rng();

  (0..RECOVERY_CODE_COUNT)
    .map(|_| {
      let groups: Vec<String> = (0..RECOVERY_CODE_GROUPS)
        .map(|_| {
          (0..RECOVERY_CODE_GROUP_LEN)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
            .collect()
        })
        .collect();
      groups.join("-")
    })
    .collect()
}

/// Strip separators and whitespace, uppercase. Users retype these by hand.
pub fn normalize_recovery_code(code: &str) -> String {
  code
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '-')
    .collect::<String>()
    .to_uppercase()
}

/// SHA-256 hex digest of the normalized code; the only form ever stored
pub fn hash_recovery_code(code: &str) -> String {
  let normalized = normalize_recovery_code(code);
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  hex::encode(hasher.finalize())
}
