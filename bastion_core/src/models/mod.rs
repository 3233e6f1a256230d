mod auth;
mod auth_token;
mod captcha;
mod code_auth;
mod ids;
mod mfa;
mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub use auth::*;
pub use auth_token::*;
pub use captcha::*;
pub use code_auth::*;
pub use ids::*;
pub use mfa::*;
pub use session::*;

/// Projection of a user owned by the user collaborator.
/// The core holds only the attributes it needs to authenticate and authorize.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
  pub id: UserId,
  pub username: String,
  pub email: String,
  pub phone: Option<String>,
  /// Anything other than 0 means the account is disabled
  pub status: i32,
  pub is_certified: bool,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn is_disabled(&self) -> bool {
    self.status != 0
  }
}

/// Display-oriented attributes stored next to the user record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserProfile {
  pub user_id: UserId,
  pub display_name: String,
  pub short_bio: Option<String>,
  #[schema(value_type = Option<Object>)]
  pub links: Option<serde_json::Value>,
}

/// Space (tenant) projection owned by the space collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Space {
  pub id: SpaceId,
  pub name: String,
  pub slug: String,
}

/// A user's membership in a space; at most one default per user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SpaceMembership {
  pub space_id: SpaceId,
  pub user_id: UserId,
  pub is_default: bool,
}

/// Role projection owned by the access collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
  pub id: RoleId,
  pub slug: String,
  pub name: String,
}

/// An `{action, subject}` permission rule; either side may be `"*"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PermissionRule {
  pub action: String,
  pub subject: String,
}

/// The authenticated principal carried through a request.
/// Built either directly from access-token claims or from a session lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
  pub id: UserId,
  pub username: String,
  pub email: String,
  pub is_admin: bool,
  pub space_id: Option<SpaceId>,
  pub space_ids: Vec<SpaceId>,
  pub roles: Vec<String>,
  pub permissions: Vec<String>,
  pub status: i32,
  pub is_certified: bool,
}

impl AuthUser {
  /// True when the principal carries the absolute wildcard permission
  pub fn has_wildcard(&self) -> bool {
    self.permissions.iter().any(|p| p == "*:*")
  }

  pub fn has_permission(&self, code: &str) -> bool {
    self.has_wildcard() || self.permissions.iter().any(|p| p == code)
  }

  pub fn has_role(&self, slug: &str) -> bool {
    self.roles.iter().any(|r| r == slug)
  }

  pub fn has_any_role(&self, slugs: &[&str]) -> bool {
    slugs.iter().any(|s| self.has_role(s))
  }
}
