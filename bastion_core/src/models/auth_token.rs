use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{AuthTokenId, UserId};

/// Server-side record identifying a token family.
/// Its id is the `jti` of the access/refresh pair minted with it;
/// revocation flips `disabled` and every refresh against it must fail.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthToken {
  pub id: AuthTokenId,
  pub user_id: UserId,
  pub disabled: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
