use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

/// Failures tolerated before the verification window locks
pub const MFA_MAX_FAILED_ATTEMPTS: i32 = 5;
/// Lock window applied when the failure budget is spent
pub const MFA_LOCKOUT_MINUTES: i64 = 10;

/// Lifecycle of a user's multi-factor setup.
/// `Absent` is represented by the row not existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaState {
  /// A secret exists but has not been verified yet
  SetupPending,
  /// Verified and required at login
  Enabled,
}

/// Per-user TOTP state. The secret is stored encrypted; recovery codes are
/// stored only as SHA-256 digests of their normalized form.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserMfa {
  pub user_id: UserId,
  pub enabled: bool,
  pub totp_secret_encrypted: Option<String>,
  pub verified_at: Option<DateTime<Utc>>,
  pub last_used_at: Option<DateTime<Utc>>,
  pub recovery_code_hashes: Vec<String>,
  pub recovery_codes_generated_at: Option<DateTime<Utc>>,
  pub failed_attempts: i32,
  pub locked_until: Option<DateTime<Utc>>,
}

impl UserMfa {
  pub fn state(&self) -> MfaState {
    if self.enabled {
      MfaState::Enabled
    } else {
      MfaState::SetupPending
    }
  }

  pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
    self.locked_until.map_or(false, |until| until > now)
  }

  pub fn remaining_recovery_codes(&self) -> usize {
    self.recovery_code_hashes.len()
  }
}
