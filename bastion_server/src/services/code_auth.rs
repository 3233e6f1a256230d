//! Email verification codes with exactly-once consumption.

use async_trait::async_trait;
use rand::Rng;
use sqlx::PgPool;

use bastion_core::models::{CodeAuth, CodeAuthId};
use bastion_core::CoreError;

/// Generate the 6-digit numeric code mailed to the user
pub fn generate_code() -> String {
  format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[async_trait]
pub trait CodeAuthStore: Send + Sync {
  async fn create(&self, email: &str, code: &str) -> Result<CodeAuth, CoreError>;

  async fn find_by_code(&self, code: &str) -> Result<Option<CodeAuth>, CoreError>;

  async fn get(&self, id: &CodeAuthId) -> Result<Option<CodeAuth>, CoreError>;

  /// Flip `logged` exactly once; a second consumption of the same id fails
  /// with `Expired`.
  async fn consume(&self, id: &CodeAuthId) -> Result<(), CoreError>;
}

pub struct PgCodeAuthStore {
  pool: PgPool,
}

impl PgCodeAuthStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl CodeAuthStore for PgCodeAuthStore {
  async fn create(&self, email: &str, code: &str) -> Result<CodeAuth, CoreError> {
    let id = CodeAuthId::generate();
    let row = sqlx::query_as::<_, CodeAuth>(
      r#"
      INSERT INTO code_auths (id, email, code, logged)
      VALUES ($1, $2, $3, FALSE)
      RETURNING id, email, code, logged, created_at
      "#,
    )
    .bind(&id)
    .bind(email)
    .bind(code)
    .fetch_one(&self.pool)
    .await?;

    Ok(row)
  }

  async fn find_by_code(&self, code: &str) -> Result<Option<CodeAuth>, CoreError> {
    let row = sqlx::query_as::<_, CodeAuth>(
      r#"
      SELECT id, email, code, logged, created_at
      FROM code_auths
      WHERE code = $1
      ORDER BY created_at DESC
      LIMIT 1
      "#,
    )
    .bind(code)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row)
  }

  async fn get(&self, id: &CodeAuthId) -> Result<Option<CodeAuth>, CoreError> {
    let row = sqlx::query_as::<_, CodeAuth>(
      r#"
      SELECT id, email, code, logged, created_at
      FROM code_auths
      WHERE id = $1
      "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row)
  }

  async fn consume(&self, id: &CodeAuthId) -> Result<(), CoreError> {
    // Conditional update keeps consumption exactly-once without a
    // cross-statement transaction
    let result = sqlx::query(
      r#"
      UPDATE code_auths
      SET logged = TRUE
      WHERE id = $1 AND logged = FALSE
      "#,
    )
    .bind(id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(CoreError::Expired("code already used".to_string()));
    }
    Ok(())
  }
}
