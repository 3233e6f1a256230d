use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::{PermissionRule, Role, RoleId, UserId};

/// Role and permission storage, owned by the access-control module
#[async_trait]
pub trait AccessCollaborator: Send + Sync {
  /// Global (space-independent) roles assigned to the user
  async fn get_user_roles(&self, user_id: &UserId) -> Result<Vec<Role>, CoreError>;

  async fn get_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<Role>, CoreError>;

  async fn find_role(&self, slug: &str) -> Result<Option<Role>, CoreError>;

  /// Ensure the super-admin role exists, creating it when missing
  async fn create_super_admin_role(&self) -> Result<Role, CoreError>;

  async fn get_role_permissions(&self, role_id: &RoleId) -> Result<Vec<PermissionRule>, CoreError>;

  async fn add_role_to_user(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), CoreError>;
}

/// External policy enforcer. Absence or failure of the engine triggers the
/// logged safe fallback in the policy gate, never an implicit allow.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
  async fn enforce(
    &self,
    subject: &str,
    domain: &str,
    object: &str,
    action: &str,
  ) -> Result<bool, CoreError>;
}
