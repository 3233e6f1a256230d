//! Persistent auth token records. The record id doubles as the `jti` of the
//! access/refresh pair minted with it; disabling the record kills every
//! future refresh against that pair.

use async_trait::async_trait;
use sqlx::PgPool;

use bastion_core::models::{AuthToken, AuthTokenId, UserId};
use bastion_core::CoreError;

#[async_trait]
pub trait AuthTokenStore: Send + Sync {
  async fn create(&self, user_id: &UserId) -> Result<AuthToken, CoreError>;

  async fn get(&self, id: &AuthTokenId) -> Result<Option<AuthToken>, CoreError>;

  async fn disable(&self, id: &AuthTokenId) -> Result<(), CoreError>;

  async fn disable_all_for_user(&self, user_id: &UserId) -> Result<(), CoreError>;
}

pub struct PgAuthTokenStore {
  pool: PgPool,
}

impl PgAuthTokenStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl AuthTokenStore for PgAuthTokenStore {
  async fn create(&self, user_id: &UserId) -> Result<AuthToken, CoreError> {
    let id = AuthTokenId::generate();
    let token = sqlx::query_as::<_, AuthToken>(
      r#"
      INSERT INTO auth_tokens (id, user_id)
      VALUES ($1, $2)
      RETURNING id, user_id, disabled, created_at, updated_at
      "#,
    )
    .bind(&id)
    .bind(user_id)
    .fetch_one(&self.pool)
    .await?;

    Ok(token)
  }

  async fn get(&self, id: &AuthTokenId) -> Result<Option<AuthToken>, CoreError> {
    let token = sqlx::query_as::<_, AuthToken>(
      r#"
      SELECT id, user_id, disabled, created_at, updated_at
      FROM auth_tokens
      WHERE id = $1
      "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(token)
  }

  async fn disable(&self, id: &AuthTokenId) -> Result<(), CoreError> {
    sqlx::query(
      r#"
      UPDATE auth_tokens
      SET disabled = TRUE, updated_at = NOW()
      WHERE id = $1
      "#,
    )
    .bind(id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn disable_all_for_user(&self, user_id: &UserId) -> Result<(), CoreError> {
    sqlx::query(
      r#"
      UPDATE auth_tokens
      SET disabled = TRUE, updated_at = NOW()
      WHERE user_id = $1 AND disabled = FALSE
      "#,
    )
    .bind(user_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}
