//! Resolution of a user's spaces: memberships, the active scope for a
//! request, and the role ids local to that scope. Membership listings are
//! cached briefly per user; the cache is a projection and read failures fall
//! through to the collaborator.

use std::sync::Arc;

use bastion_core::contracts::{Cache, SpaceCollaborator};
use bastion_core::models::{RoleId, Space, SpaceId, SpaceMembership, UserId};
use bastion_core::CoreError;

use super::infrastructure::cache::{cache_del, cache_get_json, cache_set_json};

const MEMBERSHIP_CACHE_TTL_SECS: u64 = 60;

fn membership_key(user_id: &UserId) -> String {
  format!("scopes:user:{}", user_id)
}

/// The tenant scope a request runs under
#[derive(Debug, Clone, Default)]
pub struct ScopeContext {
  pub space_id: Option<SpaceId>,
  pub space_ids: Vec<SpaceId>,
  pub default_space: Option<Space>,
  pub local_role_ids: Vec<RoleId>,
}

pub struct ScopeResolver {
  spaces: Arc<dyn SpaceCollaborator>,
  cache: Option<Arc<dyn Cache>>,
}

impl ScopeResolver {
  pub fn new(spaces: Arc<dyn SpaceCollaborator>, cache: Option<Arc<dyn Cache>>) -> Self {
    Self { spaces, cache }
  }

  pub async fn memberships(&self, user_id: &UserId) -> Result<Vec<SpaceMembership>, CoreError> {
    let key = membership_key(user_id);
    if let Some(cache) = &self.cache {
      if let Some(memberships) =
        cache_get_json::<Vec<SpaceMembership>>(cache.as_ref(), &key).await
      {
        return Ok(memberships);
      }
    }

    let memberships = self.spaces.list_by_user(user_id).await?;
    if let Some(cache) = &self.cache {
      cache_set_json(cache.as_ref(), &key, &memberships, MEMBERSHIP_CACHE_TTL_SECS).await;
    }
    Ok(memberships)
  }

  pub async fn invalidate(&self, user_id: &UserId) {
    if let Some(cache) = &self.cache {
      cache_del(cache.as_ref(), &membership_key(user_id)).await;
    }
  }

  /// Resolve the active scope for a request. A requested scope must be one
  /// of the user's memberships; with no request the default membership (or
  /// the first one) wins. Users without memberships resolve to no scope.
  pub async fn resolve(
    &self,
    user_id: &UserId,
    requested: Option<&SpaceId>,
  ) -> Result<ScopeContext, CoreError> {
    let memberships = self.memberships(user_id).await?;
    let space_ids: Vec<SpaceId> = memberships.iter().map(|m| m.space_id.clone()).collect();

    let active = match requested {
      Some(id) => {
        if !space_ids.contains(id) {
          return Err(CoreError::Forbidden(
            "not a member of the requested space".to_string(),
          ));
        }
        Some(id.clone())
      }
      None => memberships
        .iter()
        .find(|m| m.is_default)
        .or_else(|| memberships.first())
        .map(|m| m.space_id.clone()),
    };

    let default_space = match memberships
      .iter()
      .find(|m| m.is_default)
      .or_else(|| memberships.first())
    {
      Some(membership) => self.spaces.get_space(&membership.space_id).await?,
      None => None,
    };

    let local_role_ids = match &active {
      Some(space_id) => self.spaces.get_user_roles_in_space(space_id, user_id).await?,
      None => vec![],
    };

    Ok(ScopeContext {
      space_id: active,
      space_ids,
      default_space,
      local_role_ids,
    })
  }
}
