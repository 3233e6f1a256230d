//! TOTP multi-factor state: storage, the setup → enabled → absent lifecycle,
//! and the verification flow shared by the login challenge and privileged
//! account operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;

use bastion_core::mfa::{
  generate_recovery_codes, generate_totp_secret, hash_recovery_code, otpauth_uri, validate_totp,
};
use bastion_core::models::{UserId, UserMfa, MFA_LOCKOUT_MINUTES, MFA_MAX_FAILED_ATTEMPTS};
use bastion_core::secrets::SecretBox;
use bastion_core::CoreError;

#[async_trait]
pub trait MfaStore: Send + Sync {
  async fn get(&self, user_id: &UserId) -> Result<Option<UserMfa>, CoreError>;

  /// Absent → SetupPending
  async fn create(&self, user_id: &UserId, encrypted_secret: &str) -> Result<UserMfa, CoreError>;

  /// SetupPending → SetupPending: a re-setup resets verification, recovery
  /// codes, the lock and the failure counter
  async fn update_setup(
    &self,
    user_id: &UserId,
    encrypted_secret: &str,
  ) -> Result<UserMfa, CoreError>;

  /// SetupPending → Enabled
  async fn enable(
    &self,
    user_id: &UserId,
    verified_at: DateTime<Utc>,
    recovery_hashes: &[String],
    generated_at: DateTime<Utc>,
  ) -> Result<(), CoreError>;

  /// Enabled → Absent; clears everything
  async fn disable(&self, user_id: &UserId) -> Result<(), CoreError>;

  /// Remove the hash from the set if present, resetting the failure counter
  /// and lock on a hit. Returns whether the hash was present.
  async fn consume_recovery_hash(&self, user_id: &UserId, hash: &str) -> Result<bool, CoreError>;

  /// Record one failed verification. Crossing the failure budget sets the
  /// lock window and resets the counter, atomically.
  async fn record_failure(&self, user_id: &UserId) -> Result<UserMfa, CoreError>;

  /// Clear counter and lock after a successful verification
  async fn reset_failures(&self, user_id: &UserId) -> Result<(), CoreError>;

  async fn replace_recovery_codes(
    &self,
    user_id: &UserId,
    hashes: &[String],
    generated_at: DateTime<Utc>,
  ) -> Result<(), CoreError>;
}

pub struct PgMfaStore {
  pool: PgPool,
}

impl PgMfaStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

const MFA_COLUMNS: &str = "user_id, enabled, totp_secret_encrypted, verified_at, last_used_at, \
                           recovery_code_hashes, recovery_codes_generated_at, failed_attempts, locked_until";

#[async_trait]
impl MfaStore for PgMfaStore {
  async fn get(&self, user_id: &UserId) -> Result<Option<UserMfa>, CoreError> {
    let row = sqlx::query_as::<_, UserMfa>(&format!(
      "SELECT {MFA_COLUMNS} FROM user_mfa WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row)
  }

  async fn create(&self, user_id: &UserId, encrypted_secret: &str) -> Result<UserMfa, CoreError> {
    let row = sqlx::query_as::<_, UserMfa>(&format!(
      "INSERT INTO user_mfa (user_id, enabled, totp_secret_encrypted, recovery_code_hashes, failed_attempts) \
       VALUES ($1, FALSE, $2, '{{}}', 0) \
       RETURNING {MFA_COLUMNS}"
    ))
    .bind(user_id)
    .bind(encrypted_secret)
    .fetch_one(&self.pool)
    .await?;

    Ok(row)
  }

  async fn update_setup(
    &self,
    user_id: &UserId,
    encrypted_secret: &str,
  ) -> Result<UserMfa, CoreError> {
    let row = sqlx::query_as::<_, UserMfa>(&format!(
      "UPDATE user_mfa \
       SET totp_secret_encrypted = $2, verified_at = NULL, recovery_code_hashes = '{{}}', \
           recovery_codes_generated_at = NULL, failed_attempts = 0, locked_until = NULL \
       WHERE user_id = $1 AND enabled = FALSE \
       RETURNING {MFA_COLUMNS}"
    ))
    .bind(user_id)
    .bind(encrypted_secret)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| CoreError::NotFound("mfa setup not found".to_string()))?;

    Ok(row)
  }

  async fn enable(
    &self,
    user_id: &UserId,
    verified_at: DateTime<Utc>,
    recovery_hashes: &[String],
    generated_at: DateTime<Utc>,
  ) -> Result<(), CoreError> {
    let result = sqlx::query(
      r#"
      UPDATE user_mfa
      SET enabled = TRUE, verified_at = $2, recovery_code_hashes = $3,
          recovery_codes_generated_at = $4, failed_attempts = 0, locked_until = NULL
      WHERE user_id = $1
      "#,
    )
    .bind(user_id)
    .bind(verified_at)
    .bind(recovery_hashes)
    .bind(generated_at)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(CoreError::NotFound("mfa setup not found".to_string()));
    }
    Ok(())
  }

  async fn disable(&self, user_id: &UserId) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM user_mfa WHERE user_id = $1")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn consume_recovery_hash(&self, user_id: &UserId, hash: &str) -> Result<bool, CoreError> {
    let result = sqlx::query(
      r#"
      UPDATE user_mfa
      SET recovery_code_hashes = array_remove(recovery_code_hashes, $2),
          failed_attempts = 0, locked_until = NULL, last_used_at = NOW()
      WHERE user_id = $1 AND $2 = ANY(recovery_code_hashes)
      "#,
    )
    .bind(user_id)
    .bind(hash)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn record_failure(&self, user_id: &UserId) -> Result<UserMfa, CoreError> {
    let row = sqlx::query_as::<_, UserMfa>(&format!(
      "UPDATE user_mfa \
       SET failed_attempts = CASE WHEN failed_attempts + 1 >= $2 THEN 0 ELSE failed_attempts + 1 END, \
           locked_until = CASE WHEN failed_attempts + 1 >= $2 \
                               THEN NOW() + make_interval(mins => $3) \
                               ELSE locked_until END \
       WHERE user_id = $1 \
       RETURNING {MFA_COLUMNS}"
    ))
    .bind(user_id)
    .bind(MFA_MAX_FAILED_ATTEMPTS)
    .bind(MFA_LOCKOUT_MINUTES as i32)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| CoreError::NotFound("mfa record not found".to_string()))?;

    Ok(row)
  }

  async fn reset_failures(&self, user_id: &UserId) -> Result<(), CoreError> {
    sqlx::query(
      r#"
      UPDATE user_mfa
      SET failed_attempts = 0, locked_until = NULL, last_used_at = NOW()
      WHERE user_id = $1
      "#,
    )
    .bind(user_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn replace_recovery_codes(
    &self,
    user_id: &UserId,
    hashes: &[String],
    generated_at: DateTime<Utc>,
  ) -> Result<(), CoreError> {
    let result = sqlx::query(
      r#"
      UPDATE user_mfa
      SET recovery_code_hashes = $2, recovery_codes_generated_at = $3
      WHERE user_id = $1 AND enabled = TRUE
      "#,
    )
    .bind(user_id)
    .bind(hashes)
    .bind(generated_at)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(CoreError::NotFound("mfa is not enabled".to_string()));
    }
    Ok(())
  }
}

/// What the account surface reports about a user's MFA state
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MfaStatus {
  pub enabled: bool,
  pub pending: bool,
  pub verified_at: Option<DateTime<Utc>>,
  pub recovery_codes_remaining: usize,
  pub recovery_codes_generated_at: Option<DateTime<Utc>>,
}

/// Result of a fresh setup: the plain secret is shown exactly once
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MfaSetup {
  pub secret: String,
  pub otpauth_uri: String,
}

/// A factor presented for verification
#[derive(Debug, Clone)]
pub enum MfaFactor {
  Totp(String),
  RecoveryCode(String),
}

impl MfaFactor {
  pub fn from_parts(
    code: Option<String>,
    recovery_code: Option<String>,
  ) -> Result<Self, CoreError> {
    match (code, recovery_code) {
      (Some(code), _) if !code.trim().is_empty() => Ok(MfaFactor::Totp(code)),
      (_, Some(recovery)) if !recovery.trim().is_empty() => Ok(MfaFactor::RecoveryCode(recovery)),
      _ => Err(CoreError::InvalidRequest(
        "code or recovery_code is required".to_string(),
      )),
    }
  }
}

pub struct MfaService {
  store: Arc<dyn MfaStore>,
  secrets: SecretBox,
  issuer: String,
}

impl MfaService {
  pub fn new(store: Arc<dyn MfaStore>, secrets: SecretBox, issuer: impl Into<String>) -> Self {
    Self {
      store,
      secrets,
      issuer: issuer.into(),
    }
  }

  pub async fn status(&self, user_id: &UserId) -> Result<MfaStatus, CoreError> {
    Ok(match self.store.get(user_id).await? {
      Some(rec) => MfaStatus {
        enabled: rec.enabled,
        pending: !rec.enabled,
        verified_at: rec.verified_at,
        recovery_codes_remaining: rec.remaining_recovery_codes(),
        recovery_codes_generated_at: rec.recovery_codes_generated_at,
      },
      None => MfaStatus {
        enabled: false,
        pending: false,
        verified_at: None,
        recovery_codes_remaining: 0,
        recovery_codes_generated_at: None,
      },
    })
  }

  pub async fn is_enabled(&self, user_id: &UserId) -> Result<bool, CoreError> {
    Ok(self.store.get(user_id).await?.map_or(false, |r| r.enabled))
  }

  /// Begin (or restart) setup. Enabled accounts must disable first.
  pub async fn setup(&self, user_id: &UserId, account: &str) -> Result<MfaSetup, CoreError> {
    let secret = generate_totp_secret();
    let sealed = self.secrets.seal(&secret)?;

    match self.store.get(user_id).await? {
      Some(rec) if rec.enabled => {
        return Err(CoreError::Conflict("mfa is already enabled".to_string()));
      }
      Some(_) => {
        self.store.update_setup(user_id, &sealed).await?;
      }
      None => {
        self.store.create(user_id, &sealed).await?;
      }
    }

    Ok(MfaSetup {
      otpauth_uri: otpauth_uri(&self.issuer, account, &secret),
      secret,
    })
  }

  /// Complete setup with a first valid code. Returns the plain recovery
  /// codes, shown this one time only.
  pub async fn verify_setup(&self, user_id: &UserId, code: &str) -> Result<Vec<String>, CoreError> {
    let rec = self
      .store
      .get(user_id)
      .await?
      .ok_or_else(|| CoreError::NotFound("mfa setup not found".to_string()))?;
    if rec.enabled {
      return Err(CoreError::Conflict("mfa is already enabled".to_string()));
    }

    let secret = self.open_secret(&rec)?;
    if !validate_totp(&secret, code, Utc::now().timestamp() as u64)? {
      return Err(CoreError::Unauthorized("invalid verification code".to_string()));
    }

    let codes = generate_recovery_codes();
    let hashes: Vec<String> = codes.iter().map(|c| hash_recovery_code(c)).collect();
    let now = Utc::now();
    self.store.enable(user_id, now, &hashes, now).await?;

    Ok(codes)
  }

  /// Verification used by the login challenge and privileged operations.
  /// Enforces the lock window, one-shot recovery codes and the failure
  /// budget.
  pub async fn verify(&self, user_id: &UserId, factor: &MfaFactor) -> Result<(), CoreError> {
    let rec = self
      .store
      .get(user_id)
      .await?
      .ok_or_else(|| CoreError::NotFound("mfa is not configured".to_string()))?;
    if !rec.enabled {
      return Err(CoreError::InvalidRequest("mfa is not enabled".to_string()));
    }

    let now = Utc::now();
    if rec.is_locked(now) {
      return Err(CoreError::LockedOut(
        "too many failed attempts, try again later".to_string(),
      ));
    }

    let verified = match factor {
      MfaFactor::RecoveryCode(code) => {
        let hash = hash_recovery_code(code);
        self.store.consume_recovery_hash(user_id, &hash).await?
      }
      MfaFactor::Totp(code) => {
        let secret = self.open_secret(&rec)?;
        let ok = validate_totp(&secret, code, now.timestamp() as u64)?;
        if ok {
          self.store.reset_failures(user_id).await?;
        }
        ok
      }
    };

    if !verified {
      self.store.record_failure(user_id).await?;
      return Err(CoreError::Unauthorized("invalid mfa code".to_string()));
    }
    Ok(())
  }

  /// Enabled → Absent; requires a fresh successful verification
  pub async fn disable(&self, user_id: &UserId, factor: &MfaFactor) -> Result<(), CoreError> {
    self.verify(user_id, factor).await?;
    self.store.disable(user_id).await
  }

  /// Re-issue the recovery code set; requires a fresh successful verification
  pub async fn regenerate_recovery_codes(
    &self,
    user_id: &UserId,
    factor: &MfaFactor,
  ) -> Result<Vec<String>, CoreError> {
    self.verify(user_id, factor).await?;

    let codes = generate_recovery_codes();
    let hashes: Vec<String> = codes.iter().map(|c| hash_recovery_code(c)).collect();
    self
      .store
      .replace_recovery_codes(user_id, &hashes, Utc::now())
      .await?;

    Ok(codes)
  }

  fn open_secret(&self, rec: &UserMfa) -> Result<String, CoreError> {
    let sealed = rec
      .totp_secret_encrypted
      .as_deref()
      .ok_or_else(|| CoreError::Internal("mfa record has no secret".to_string()))?;
    self.secrets.open(sealed)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use base64::engine::general_purpose::STANDARD as B64;
  use base64::Engine;
  use chrono::Duration;
  use std::collections::HashMap;
  use std::sync::Mutex;
  use totp_lite::{totp_custom, Sha1};

  /// In-memory store mirroring the SQL semantics, for service-level tests
  #[derive(Default)]
  pub struct MemoryMfaStore {
    rows: Mutex<HashMap<UserId, UserMfa>>,
  }

  #[async_trait]
  impl MfaStore for MemoryMfaStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserMfa>, CoreError> {
      Ok(self.rows.lock().unwrap().get(user_id).cloned())
    }

    async fn create(&self, user_id: &UserId, encrypted_secret: &str) -> Result<UserMfa, CoreError> {
      let rec = UserMfa {
        user_id: user_id.clone(),
        enabled: false,
        totp_secret_encrypted: Some(encrypted_secret.to_string()),
        verified_at: None,
        last_used_at: None,
        recovery_code_hashes: vec![],
        recovery_codes_generated_at: None,
        failed_attempts: 0,
        locked_until: None,
      };
      self
        .rows
        .lock()
        .unwrap()
        .insert(user_id.clone(), rec.clone());
      Ok(rec)
    }

    async fn update_setup(
      &self,
      user_id: &UserId,
      encrypted_secret: &str,
    ) -> Result<UserMfa, CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let rec = rows
        .get_mut(user_id)
        .filter(|r| !r.enabled)
        .ok_or_else(|| CoreError::NotFound("mfa setup not found".to_string()))?;
      rec.totp_secret_encrypted = Some(encrypted_secret.to_string());
      rec.verified_at = None;
      rec.recovery_code_hashes.clear();
      rec.recovery_codes_generated_at = None;
      rec.failed_attempts = 0;
      rec.locked_until = None;
      Ok(rec.clone())
    }

    async fn enable(
      &self,
      user_id: &UserId,
      verified_at: DateTime<Utc>,
      recovery_hashes: &[String],
      generated_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let rec = rows
        .get_mut(user_id)
        .ok_or_else(|| CoreError::NotFound("mfa setup not found".to_string()))?;
      rec.enabled = true;
      rec.verified_at = Some(verified_at);
      rec.recovery_code_hashes = recovery_hashes.to_vec();
      rec.recovery_codes_generated_at = Some(generated_at);
      rec.failed_attempts = 0;
      rec.locked_until = None;
      Ok(())
    }

    async fn disable(&self, user_id: &UserId) -> Result<(), CoreError> {
      self.rows.lock().unwrap().remove(user_id);
      Ok(())
    }

    async fn consume_recovery_hash(&self, user_id: &UserId, hash: &str) -> Result<bool, CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let Some(rec) = rows.get_mut(user_id) else {
        return Ok(false);
      };
      let before = rec.recovery_code_hashes.len();
      rec.recovery_code_hashes.retain(|h| h != hash);
      if rec.recovery_code_hashes.len() < before {
        rec.failed_attempts = 0;
        rec.locked_until = None;
        rec.last_used_at = Some(Utc::now());
        Ok(true)
      } else {
        Ok(false)
      }
    }

    async fn record_failure(&self, user_id: &UserId) -> Result<UserMfa, CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let rec = rows
        .get_mut(user_id)
        .ok_or_else(|| CoreError::NotFound("mfa record not found".to_string()))?;
      if rec.failed_attempts + 1 >= MFA_MAX_FAILED_ATTEMPTS {
        rec.failed_attempts = 0;
        rec.locked_until = Some(Utc::now() + Duration::minutes(MFA_LOCKOUT_MINUTES));
      } else {
        rec.failed_attempts += 1;
      }
      Ok(rec.clone())
    }

    async fn reset_failures(&self, user_id: &UserId) -> Result<(), CoreError> {
      let mut rows = self.rows.lock().unwrap();
      if let Some(rec) = rows.get_mut(user_id) {
        rec.failed_attempts = 0;
        rec.locked_until = None;
        rec.last_used_at = Some(Utc::now());
      }
      Ok(())
    }

    async fn replace_recovery_codes(
      &self,
      user_id: &UserId,
      hashes: &[String],
      generated_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let rec = rows
        .get_mut(user_id)
        .filter(|r| r.enabled)
        .ok_or_else(|| CoreError::NotFound("mfa is not enabled".to_string()))?;
      rec.recovery_code_hashes = hashes.to_vec();
      rec.recovery_codes_generated_at = Some(generated_at);
      Ok(())
    }
  }

  pub fn service() -> (MfaService, Arc<MemoryMfaStore>) {
    let store = Arc::new(MemoryMfaStore::default());
    let secrets = SecretBox::from_base64_key(&B64.encode([42u8; 32])).unwrap();
    (
      MfaService::new(store.clone(), secrets, "bastion"),
      store,
    )
  }

  fn current_code(secret: &str) -> String {
    let key = data_encoding::BASE32_NOPAD.decode(secret.as_bytes()).unwrap();
    totp_custom::<Sha1>(30, 6, &key, Utc::now().timestamp() as u64)
  }

  /// Walk a user through setup → enabled, returning the recovery codes
  pub async fn enable_for(service: &MfaService, user: &UserId) -> (String, Vec<String>) {
    let setup = service.setup(user, "alice@example.com").await.unwrap();
    let codes = service
      .verify_setup(user, &current_code(&setup.secret))
      .await
      .unwrap();
    (setup.secret, codes)
  }

  #[tokio::test]
  async fn setup_verify_enable_happy_path() {
    let (service, _) = service();
    let user = UserId::from("u-1");

    let (_, codes) = enable_for(&service, &user).await;
    assert_eq!(codes.len(), 10);

    let status = service.status(&user).await.unwrap();
    assert!(status.enabled);
    assert_eq!(status.recovery_codes_remaining, 10);
  }

  #[tokio::test]
  async fn totp_verification_succeeds_and_wrong_code_fails() {
    let (service, _) = service();
    let user = UserId::from("u-1");
    let (secret, _) = enable_for(&service, &user).await;

    service
      .verify(&user, &MfaFactor::Totp(current_code(&secret)))
      .await
      .unwrap();

    let err = service
      .verify(&user, &MfaFactor::Totp("000000".into()))
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));
  }

  #[tokio::test]
  async fn recovery_codes_are_one_shot() {
    let (service, _) = service();
    let user = UserId::from("u-1");
    let (_, codes) = enable_for(&service, &user).await;

    service
      .verify(&user, &MfaFactor::RecoveryCode(codes[0].clone()))
      .await
      .unwrap();

    let err = service
      .verify(&user, &MfaFactor::RecoveryCode(codes[0].clone()))
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    let status = service.status(&user).await.unwrap();
    assert_eq!(status.recovery_codes_remaining, 9);
  }

  #[tokio::test]
  async fn fifth_failure_locks_even_the_correct_code_and_recovery() {
    let (service, store) = service();
    let user = UserId::from("u-1");
    let (secret, codes) = enable_for(&service, &user).await;

    for _ in 0..4 {
      let _ = service.verify(&user, &MfaFactor::Totp("000000".into())).await;
    }
    {
      let rec = store.get(&user).await.unwrap().unwrap();
      assert_eq!(rec.failed_attempts, 4);
      assert!(rec.locked_until.is_none());
    }

    // Fifth failure trips the lock and resets the counter
    let _ = service.verify(&user, &MfaFactor::Totp("000000".into())).await;
    {
      let rec = store.get(&user).await.unwrap().unwrap();
      assert_eq!(rec.failed_attempts, 0);
      assert!(rec.locked_until.is_some());
    }

    let err = service
      .verify(&user, &MfaFactor::Totp(current_code(&secret)))
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::LockedOut(_)));

    // A valid recovery code inside the window is also rejected
    let err = service
      .verify(&user, &MfaFactor::RecoveryCode(codes[0].clone()))
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::LockedOut(_)));
  }

  #[tokio::test]
  async fn disable_requires_verification_and_clears_state() {
    let (service, _) = service();
    let user = UserId::from("u-1");
    let (secret, _) = enable_for(&service, &user).await;

    let err = service
      .disable(&user, &MfaFactor::Totp("000000".into()))
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    service
      .disable(&user, &MfaFactor::Totp(current_code(&secret)))
      .await
      .unwrap();

    let status = service.status(&user).await.unwrap();
    assert!(!status.enabled);
    assert!(!status.pending);
  }

  #[tokio::test]
  async fn regenerate_replaces_the_whole_set() {
    let (service, _) = service();
    let user = UserId::from("u-1");
    let (secret, old_codes) = enable_for(&service, &user).await;

    let new_codes = service
      .regenerate_recovery_codes(&user, &MfaFactor::Totp(current_code(&secret)))
      .await
      .unwrap();
    assert_eq!(new_codes.len(), 10);

    // Old codes are dead after regeneration
    let err = service
      .verify(&user, &MfaFactor::RecoveryCode(old_codes[0].clone()))
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    service
      .verify(&user, &MfaFactor::RecoveryCode(new_codes[0].clone()))
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn setup_while_enabled_is_a_conflict() {
    let (service, _) = service();
    let user = UserId::from("u-1");
    enable_for(&service, &user).await;

    let err = service.setup(&user, "alice@example.com").await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
  }
}
