//! Reference sqlx implementations of the collaborator contracts, narrow by
//! design: enough user/space/role storage for the identity plane to run end
//! to end, none of the surrounding business CRUD.

use argon2::{
  password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
  Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;
use sqlx::PgPool;

use bastion_core::contracts::{
  AccessCollaborator, CreateProfileRecord, CreateUserRecord, PasswordVerdict, SpaceCollaborator,
  UserCollaborator, UserSelector,
};
use bastion_core::models::{
  PermissionRule, Role, RoleId, Space, SpaceId, SpaceMembership, User, UserId, UserProfile,
};
use bastion_core::CoreError;

/// Argon2id PHC-string hashing, shared by password set and verify paths
pub fn hashed_password(password: &str) -> Result<String, CoreError> {
  let salt = SaltString::generate(OsRng);
  let argon2 = Argon2::default();

  let password_hash = argon2
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| CoreError::Internal(e.to_string()))?
    .to_string();

  Ok(password_hash)
}

pub fn verify_password_hash(password: &str, password_hash: &str) -> Result<bool, CoreError> {
  let argon2 = Argon2::default();
  let parsed_hash =
    PasswordHash::new(password_hash).map_err(|e| CoreError::Internal(e.to_string()))?;

  Ok(
    argon2
      .verify_password(password.as_bytes(), &parsed_hash)
      .is_ok(),
  )
}

const USER_COLUMNS: &str = "id, username, email, phone, status, is_certified, created_at";

pub struct PgUserCollaborator {
  pool: PgPool,
}

impl PgUserCollaborator {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl UserCollaborator for PgUserCollaborator {
  async fn find_user(&self, selector: &UserSelector) -> Result<Option<User>, CoreError> {
    let (column, value) = match selector {
      UserSelector::Username(v) => ("username", v),
      UserSelector::Email(v) => ("email", v),
      UserSelector::Phone(v) => ("phone", v),
    };

    let user = sqlx::query_as::<_, User>(&format!(
      "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
    ))
    .bind(value)
    .fetch_optional(&self.pool)
    .await?;

    Ok(user)
  }

  async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;

    Ok(user)
  }

  async fn get_profile(&self, id: &UserId) -> Result<Option<UserProfile>, CoreError> {
    let profile = sqlx::query_as::<_, UserProfile>(
      "SELECT user_id, display_name, short_bio, links FROM user_profiles WHERE user_id = $1",
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(profile)
  }

  async fn count_users(&self) -> Result<i64, CoreError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
      .fetch_one(&self.pool)
      .await?;
    Ok(count.0)
  }

  async fn create_user_with_profile(
    &self,
    user: CreateUserRecord,
    profile: CreateProfileRecord,
  ) -> Result<User, CoreError> {
    let mut tx = self.pool.begin().await?;
    let id = UserId::generate();

    let created = sqlx::query_as::<_, User>(&format!(
      "INSERT INTO users (id, username, email, phone, status, is_certified) \
       VALUES ($1, $2, $3, $4, 0, TRUE) \
       RETURNING {USER_COLUMNS}"
    ))
    .bind(&id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.phone)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
      "INSERT INTO user_profiles (user_id, display_name, short_bio) VALUES ($1, $2, $3)",
    )
    .bind(&id)
    .bind(&profile.display_name)
    .bind(&profile.short_bio)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(created)
  }

  async fn verify_password(
    &self,
    id: &UserId,
    password: &str,
  ) -> Result<PasswordVerdict, CoreError> {
    let stored: Option<(Option<String>,)> =
      sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

    let Some((hash,)) = stored else {
      return Err(CoreError::NotFound("user not found".to_string()));
    };

    match hash.as_deref() {
      None | Some("") => Ok(PasswordVerdict::NeedsPasswordSet),
      Some(hash) => {
        if verify_password_hash(password, hash)? {
          Ok(PasswordVerdict::Valid)
        } else {
          Ok(PasswordVerdict::Invalid(
            "invalid username or password".to_string(),
          ))
        }
      }
    }
  }

  async fn update_password(
    &self,
    id: &UserId,
    old_password: Option<&str>,
    new_password: &str,
  ) -> Result<(), CoreError> {
    match self
      .verify_password(id, old_password.unwrap_or_default())
      .await?
    {
      PasswordVerdict::Valid | PasswordVerdict::NeedsPasswordSet => {}
      PasswordVerdict::Invalid(msg) => return Err(CoreError::Unauthorized(msg)),
    }

    let hash = hashed_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
      .bind(&hash)
      .bind(id)
      .execute(&self.pool)
      .await?;

    Ok(())
  }
}

pub struct PgSpaceCollaborator {
  pool: PgPool,
}

impl PgSpaceCollaborator {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl SpaceCollaborator for PgSpaceCollaborator {
  async fn create_space(&self, name: &str, slug: &str) -> Result<Space, CoreError> {
    // Idempotent by slug: a second creation returns the existing row
    let space = sqlx::query_as::<_, Space>(
      r#"
      INSERT INTO spaces (id, name, slug)
      VALUES ($1, $2, $3)
      ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
      RETURNING id, name, slug
      "#,
    )
    .bind(SpaceId::generate())
    .bind(name)
    .bind(slug)
    .fetch_one(&self.pool)
    .await?;

    Ok(space)
  }

  async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>, CoreError> {
    let space = sqlx::query_as::<_, Space>("SELECT id, name, slug FROM spaces WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(space)
  }

  async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<SpaceMembership>, CoreError> {
    let memberships = sqlx::query_as::<_, SpaceMembership>(
      "SELECT space_id, user_id, is_default FROM space_members WHERE user_id = $1 \
       ORDER BY is_default DESC, space_id",
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(memberships)
  }

  async fn get_default_by_user(
    &self,
    user_id: &UserId,
  ) -> Result<Option<SpaceMembership>, CoreError> {
    let membership = sqlx::query_as::<_, SpaceMembership>(
      "SELECT space_id, user_id, is_default FROM space_members \
       WHERE user_id = $1 AND is_default = TRUE",
    )
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(membership)
  }

  async fn add_user_to_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
    is_default: bool,
  ) -> Result<(), CoreError> {
    let mut tx = self.pool.begin().await?;

    if is_default {
      // At most one default membership per user
      sqlx::query("UPDATE space_members SET is_default = FALSE WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
      "INSERT INTO space_members (space_id, user_id, is_default) VALUES ($1, $2, $3) \
       ON CONFLICT (space_id, user_id) DO UPDATE SET is_default = EXCLUDED.is_default",
    )
    .bind(space_id)
    .bind(user_id)
    .bind(is_default)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
  }

  async fn add_role_to_user_in_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
    role_id: &RoleId,
  ) -> Result<(), CoreError> {
    sqlx::query(
      "INSERT INTO space_member_roles (space_id, user_id, role_id) VALUES ($1, $2, $3) \
       ON CONFLICT DO NOTHING",
    )
    .bind(space_id)
    .bind(user_id)
    .bind(role_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn get_user_roles_in_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
  ) -> Result<Vec<RoleId>, CoreError> {
    let rows: Vec<(RoleId,)> = sqlx::query_as(
      "SELECT role_id FROM space_member_roles WHERE space_id = $1 AND user_id = $2",
    )
    .bind(space_id)
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
  }
}

pub struct PgAccessCollaborator {
  pool: PgPool,
}

impl PgAccessCollaborator {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl AccessCollaborator for PgAccessCollaborator {
  async fn get_user_roles(&self, user_id: &UserId) -> Result<Vec<Role>, CoreError> {
    let roles = sqlx::query_as::<_, Role>(
      r#"
      SELECT r.id, r.slug, r.name
      FROM roles r
      JOIN user_roles ur ON ur.role_id = r.id
      WHERE ur.user_id = $1
      "#,
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(roles)
  }

  async fn get_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<Role>, CoreError> {
    if ids.is_empty() {
      return Ok(vec![]);
    }

    let id_strings: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
    let roles =
      sqlx::query_as::<_, Role>("SELECT id, slug, name FROM roles WHERE id = ANY($1)")
        .bind(&id_strings)
        .fetch_all(&self.pool)
        .await?;
    Ok(roles)
  }

  async fn find_role(&self, slug: &str) -> Result<Option<Role>, CoreError> {
    let role = sqlx::query_as::<_, Role>("SELECT id, slug, name FROM roles WHERE slug = $1")
      .bind(slug)
      .fetch_optional(&self.pool)
      .await?;
    Ok(role)
  }

  async fn create_super_admin_role(&self) -> Result<Role, CoreError> {
    if let Some(existing) = self.find_role("super-admin").await? {
      return Ok(existing);
    }

    let mut tx = self.pool.begin().await?;
    let role = sqlx::query_as::<_, Role>(
      r#"
      INSERT INTO roles (id, slug, name)
      VALUES ($1, 'super-admin', 'Super Admin')
      ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
      RETURNING id, slug, name
      "#,
    )
    .bind(RoleId::generate())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
      "INSERT INTO role_permissions (role_id, action, subject) VALUES ($1, '*', '*') \
       ON CONFLICT DO NOTHING",
    )
    .bind(&role.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(role)
  }

  async fn get_role_permissions(&self, role_id: &RoleId) -> Result<Vec<PermissionRule>, CoreError> {
    let rules = sqlx::query_as::<_, PermissionRule>(
      "SELECT action, subject FROM role_permissions WHERE role_id = $1",
    )
    .bind(role_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(rules)
  }

  async fn add_role_to_user(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), CoreError> {
    sqlx::query(
      "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_hashing_round_trips() {
    let hash = hashed_password("hunter4332").unwrap();
    assert!(verify_password_hash("hunter4332", &hash).unwrap());
    assert!(!verify_password_hash("wrong", &hash).unwrap());
  }
}
