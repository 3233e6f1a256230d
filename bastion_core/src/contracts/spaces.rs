use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::{RoleId, Space, SpaceId, SpaceMembership, UserId};

/// Tenant-boundary storage, owned by the space module
#[async_trait]
pub trait SpaceCollaborator: Send + Sync {
  /// Creating an already-existing slug returns the existing space
  async fn create_space(&self, name: &str, slug: &str) -> Result<Space, CoreError>;

  async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>, CoreError>;

  async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<SpaceMembership>, CoreError>;

  async fn get_default_by_user(
    &self,
    user_id: &UserId,
  ) -> Result<Option<SpaceMembership>, CoreError>;

  async fn add_user_to_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
    is_default: bool,
  ) -> Result<(), CoreError>;

  async fn add_role_to_user_in_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
    role_id: &RoleId,
  ) -> Result<(), CoreError>;

  async fn get_user_roles_in_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
  ) -> Result<Vec<RoleId>, CoreError>;
}
