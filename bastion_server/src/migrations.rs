//! Embedded schema migrations, executed at startup. Statements are
//! idempotent (`IF NOT EXISTS`) so re-running on boot is safe.

use sqlx::PgPool;
use tracing::info;

use bastion_core::CoreError;

async fn execute_migration(pool: &PgPool, name: &str, sql: &str) -> Result<(), CoreError> {
  info!("running migration: {}", name);

  for statement in sql.split(';') {
    let statement = statement.trim();
    if !statement.is_empty() {
      sqlx::query(statement).execute(pool).await?;
    }
  }

  Ok(())
}

pub async fn run(pool: &PgPool) -> Result<(), CoreError> {
  execute_migration(
    pool,
    "0001_identity",
    include_str!("../migrations/0001_identity.sql"),
  )
  .await?;
  execute_migration(
    pool,
    "0002_spaces_roles",
    include_str!("../migrations/0002_spaces_roles.sql"),
  )
  .await?;
  execute_migration(
    pool,
    "0003_auth",
    include_str!("../migrations/0003_auth.sql"),
  )
  .await?;

  Ok(())
}
