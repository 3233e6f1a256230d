use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::CodeAuthId;

/// How long an emailed login/register code stays usable
pub const CODE_AUTH_TTL_HOURS: i64 = 24;

/// A single-use email verification code
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CodeAuth {
  pub id: CodeAuthId,
  pub email: String,
  pub code: String,
  /// Set once the code has been consumed; a consumed code can never be reused
  pub logged: bool,
  pub created_at: DateTime<Utc>,
}

impl CodeAuth {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.created_at + Duration::hours(CODE_AUTH_TTL_HOURS) < now
  }
}
