//! Expansion of roles into normalized permission codes.
//!
//! A code is `action:subject`. Rules arrive either HTTP-shaped (method +
//! path) or semantic (verb + noun) and both normalize onto the same code
//! space, with singular/plural subject variants emitted so `read:user` and
//! `read:users` behave identically. The output set is order-independent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bastion_core::contracts::AccessCollaborator;
use bastion_core::models::{PermissionRule, Role, SpaceId, UserId};
use bastion_core::CoreError;

use super::scopes::ScopeContext;

/// Role slugs that short-circuit permission gates
pub const ADMIN_ROLE_SLUGS: [&str; 5] = [
  "super-admin",
  "system-admin",
  "enterprise-admin",
  "space-admin",
  "tenant-admin",
];

/// The absolute wildcard code
pub const WILDCARD_CODE: &str = "*:*";

const SEMANTIC_ACTIONS: [&str; 6] = ["read", "create", "update", "delete", "manage", "*"];

/// Map an HTTP method onto its semantic action
pub fn semantic_action_for_method(method: &str) -> Option<&'static str> {
  match method.to_uppercase().as_str() {
    "GET" | "HEAD" | "OPTIONS" => Some("read"),
    "POST" => Some("create"),
    "PUT" | "PATCH" => Some("update"),
    "DELETE" => Some("delete"),
    "*" => Some("*"),
    _ => None,
  }
}

fn is_http_action(action: &str) -> bool {
  semantic_action_for_method(action).is_some()
}

fn is_semantic_action(action: &str) -> bool {
  SEMANTIC_ACTIONS.contains(&action.to_lowercase().as_str())
}

/// Extract the permission subject from a URL path: drop a leading `api/`
/// and a `v<N>` version segment, skip `{…}` templates, strip `*` and
/// trailing slashes, lower-case, and take the first remaining segment.
pub fn subject_from_path(path: &str) -> Option<String> {
  let trimmed = path.trim().trim_end_matches(['*', '/']);

  let mut segments = trimmed
    .split('/')
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .peekable();

  if segments.peek().map(|s| s.eq_ignore_ascii_case("api")) == Some(true) {
    segments.next();
  }
  if segments.peek().map(|s| is_version_segment(s)) == Some(true) {
    segments.next();
  }

  segments
    .filter(|s| !(s.starts_with('{') && s.ends_with('}')))
    .map(|s| s.trim_matches('*'))
    .find(|s| !s.is_empty())
    .map(|s| s.to_lowercase())
}

fn is_version_segment(segment: &str) -> bool {
  let mut chars = segment.chars();
  chars.next() == Some('v') && !segment[1..].is_empty() && segment[1..].chars().all(|c| c.is_ascii_digit())
}

/// The permission code a request must hold, derived from its method + path
pub fn permission_code_for_request(method: &str, path: &str) -> Option<String> {
  let action = semantic_action_for_method(method)?;
  let subject = subject_from_path(path)?;
  Some(format!("{}:{}", action, subject))
}

fn singularize(subject: &str) -> Option<String> {
  if let Some(stem) = subject.strip_suffix("ies") {
    if !stem.is_empty() {
      return Some(format!("{}y", stem));
    }
  }
  if let Some(stem) = subject.strip_suffix("es") {
    if ["ch", "sh"].iter().any(|s| stem.ends_with(s))
      || stem.ends_with('x')
      || stem.ends_with('z')
    {
      return Some(stem.to_string());
    }
  }
  if let Some(stem) = subject.strip_suffix('s') {
    if !stem.is_empty() && !stem.ends_with('s') {
      return Some(stem.to_string());
    }
  }
  None
}

fn pluralize(subject: &str) -> Option<String> {
  if subject.ends_with('s') {
    return None;
  }
  if let Some(stem) = subject.strip_suffix('y') {
    if !stem.is_empty() {
      return Some(format!("{}ies", stem));
    }
  }
  if subject.ends_with("ch") || subject.ends_with("sh") || subject.ends_with('x') || subject.ends_with('z') {
    return Some(format!("{}es", subject));
  }
  Some(format!("{}s", subject))
}

/// The subject plus its singular/plural companions
fn subject_variants(subject: &str) -> BTreeSet<String> {
  let mut variants = BTreeSet::new();
  variants.insert(subject.to_string());
  if let Some(singular) = singularize(subject) {
    variants.insert(singular);
  }
  if let Some(plural) = pluralize(subject) {
    variants.insert(plural);
  }
  variants
}

/// Normalize one rule into zero or more permission codes
pub fn normalize_rule(rule: &PermissionRule) -> BTreeSet<String> {
  let action = rule.action.trim();
  let subject = rule.subject.trim();

  if action == "*" && subject == "*" {
    return BTreeSet::from([WILDCARD_CODE.to_string()]);
  }

  let looks_http = subject.starts_with('/') || is_http_action(action);

  let (action, subject) = if looks_http {
    let Some(mapped) = semantic_action_for_method(action) else {
      return BTreeSet::new();
    };
    let subject = if subject.starts_with('/') {
      match subject_from_path(subject) {
        Some(s) => s,
        None => return BTreeSet::new(),
      }
    } else {
      subject.to_lowercase()
    };
    (mapped.to_string(), subject)
  } else if is_semantic_action(action) {
    (action.to_lowercase(), subject.to_lowercase())
  } else {
    return BTreeSet::new();
  };

  if subject == "*" {
    return BTreeSet::from([format!("{}:*", action)]);
  }

  subject_variants(&subject)
    .into_iter()
    .map(|variant| format!("{}:{}", action, variant))
    .collect()
}

/// The authorization context produced for a request
#[derive(Debug, Clone, Default)]
pub struct PermissionContext {
  pub space_id: Option<SpaceId>,
  pub role_slugs: Vec<String>,
  pub permission_codes: BTreeSet<String>,
  pub is_admin: bool,
}

impl PermissionContext {
  pub fn has_wildcard(&self) -> bool {
    self.permission_codes.contains(WILDCARD_CODE)
  }
}

pub struct PermissionResolver {
  access: Arc<dyn AccessCollaborator>,
}

impl PermissionResolver {
  pub fn new(access: Arc<dyn AccessCollaborator>) -> Self {
    Self { access }
  }

  /// Compose global and scope-local roles and expand them into codes.
  /// Idempotent and order-independent in its inputs.
  pub async fn resolve(
    &self,
    user_id: &UserId,
    scope: &ScopeContext,
  ) -> Result<PermissionContext, CoreError> {
    let global = self.access.get_user_roles(user_id).await?;
    let local = self.access.get_roles_by_ids(&scope.local_role_ids).await?;

    // Dedup by slug; a role assigned both globally and locally counts once
    let mut roles: BTreeMap<String, Role> = BTreeMap::new();
    for role in global.into_iter().chain(local) {
      roles.entry(role.slug.clone()).or_insert(role);
    }

    let role_slugs: Vec<String> = roles.keys().cloned().collect();
    let is_admin = role_slugs
      .iter()
      .any(|slug| ADMIN_ROLE_SLUGS.contains(&slug.as_str()));

    let mut codes = BTreeSet::new();
    for role in roles.values() {
      for rule in self.access.get_role_permissions(&role.id).await? {
        let normalized = normalize_rule(&rule);
        if normalized.contains(WILDCARD_CODE) {
          // The absolute wildcard swallows everything else
          return Ok(PermissionContext {
            space_id: scope.space_id.clone(),
            role_slugs,
            permission_codes: BTreeSet::from([WILDCARD_CODE.to_string()]),
            is_admin,
          });
        }
        codes.extend(normalized);
      }
    }

    Ok(PermissionContext {
      space_id: scope.space_id.clone(),
      role_slugs,
      permission_codes: codes,
      is_admin,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use bastion_core::models::RoleId;
  use std::collections::HashMap;
  use std::sync::Mutex;

  fn rule(action: &str, subject: &str) -> PermissionRule {
    PermissionRule {
      action: action.to_string(),
      subject: subject.to_string(),
    }
  }

  #[test]
  fn http_methods_map_to_semantic_actions() {
    assert_eq!(semantic_action_for_method("GET"), Some("read"));
    assert_eq!(semantic_action_for_method("head"), Some("read"));
    assert_eq!(semantic_action_for_method("OPTIONS"), Some("read"));
    assert_eq!(semantic_action_for_method("POST"), Some("create"));
    assert_eq!(semantic_action_for_method("PUT"), Some("update"));
    assert_eq!(semantic_action_for_method("PATCH"), Some("update"));
    assert_eq!(semantic_action_for_method("DELETE"), Some("delete"));
    assert_eq!(semantic_action_for_method("*"), Some("*"));
    assert_eq!(semantic_action_for_method("TRACE"), None);
  }

  #[test]
  fn path_subjects_drop_api_and_version_prefixes() {
    assert_eq!(subject_from_path("/api/v1/users"), Some("users".into()));
    assert_eq!(subject_from_path("/api/v1/users/42"), Some("users".into()));
    assert_eq!(subject_from_path("/api/v2/Users/"), Some("users".into()));
    assert_eq!(subject_from_path("/users"), Some("users".into()));
    assert_eq!(subject_from_path("/api/v1/users/*"), Some("users".into()));
    assert_eq!(
      subject_from_path("/api/v1/{space_id}/workflows"),
      Some("workflows".into())
    );
    assert_eq!(subject_from_path("/api/v1/"), None);
    // "version" is a real segment, not a version marker
    assert_eq!(subject_from_path("/api/version"), Some("version".into()));
  }

  #[test]
  fn request_codes_follow_method_and_path() {
    assert_eq!(
      permission_code_for_request("GET", "/api/v1/users"),
      Some("read:users".into())
    );
    assert_eq!(
      permission_code_for_request("DELETE", "/api/v1/users/42"),
      Some("delete:users".into())
    );
    assert_eq!(permission_code_for_request("TRACE", "/api/v1/users"), None);
  }

  #[test]
  fn absolute_wildcard_short_circuits() {
    assert_eq!(
      normalize_rule(&rule("*", "*")),
      BTreeSet::from([WILDCARD_CODE.to_string()])
    );
  }

  #[test]
  fn http_rules_normalize_with_variants() {
    let codes = normalize_rule(&rule("GET", "/api/v1/users"));
    assert!(codes.contains("read:users"));
    assert!(codes.contains("read:user"));
  }

  #[test]
  fn semantic_rules_lowercase_and_expand() {
    let codes = normalize_rule(&rule("Read", "Users"));
    assert!(codes.contains("read:users"));
    assert!(codes.contains("read:user"));

    let codes = normalize_rule(&rule("manage", "workflow"));
    assert!(codes.contains("manage:workflow"));
    assert!(codes.contains("manage:workflows"));
  }

  #[test]
  fn english_variant_rules_apply() {
    // ies <-> y
    let codes = normalize_rule(&rule("read", "policies"));
    assert!(codes.contains("read:policy"));
    // ch/sh/x/z gain es
    let codes = normalize_rule(&rule("read", "box"));
    assert!(codes.contains("read:boxes"));
    let codes = normalize_rule(&rule("read", "branch"));
    assert!(codes.contains("read:branches"));
    // plain trailing s removal
    let codes = normalize_rule(&rule("read", "sessions"));
    assert!(codes.contains("read:session"));
  }

  #[test]
  fn action_wildcard_keeps_subject_wildcard_unexpanded() {
    let codes = normalize_rule(&rule("read", "*"));
    assert_eq!(codes, BTreeSet::from(["read:*".to_string()]));
  }

  #[test]
  fn unknown_actions_produce_nothing() {
    assert!(normalize_rule(&rule("frobnicate", "users")).is_empty());
  }

  // ---- resolver over a mock access collaborator ----

  #[derive(Default)]
  struct MemoryAccess {
    user_roles: Mutex<HashMap<UserId, Vec<Role>>>,
    roles: Mutex<HashMap<RoleId, Role>>,
    role_permissions: Mutex<HashMap<RoleId, Vec<PermissionRule>>>,
  }

  impl MemoryAccess {
    fn add_role(&self, slug: &str, rules: Vec<PermissionRule>) -> Role {
      let role = Role {
        id: RoleId::generate(),
        slug: slug.to_string(),
        name: slug.to_string(),
      };
      self
        .roles
        .lock()
        .unwrap()
        .insert(role.id.clone(), role.clone());
      self
        .role_permissions
        .lock()
        .unwrap()
        .insert(role.id.clone(), rules);
      role
    }

    fn assign(&self, user: &UserId, role: &Role) {
      self
        .user_roles
        .lock()
        .unwrap()
        .entry(user.clone())
        .or_default()
        .push(role.clone());
    }
  }

  #[async_trait]
  impl AccessCollaborator for MemoryAccess {
    async fn get_user_roles(&self, user_id: &UserId) -> Result<Vec<Role>, CoreError> {
      Ok(
        self
          .user_roles
          .lock()
          .unwrap()
          .get(user_id)
          .cloned()
          .unwrap_or_default(),
      )
    }

    async fn get_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<Role>, CoreError> {
      let roles = self.roles.lock().unwrap();
      Ok(ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
    }

    async fn find_role(&self, slug: &str) -> Result<Option<Role>, CoreError> {
      Ok(
        self
          .roles
          .lock()
          .unwrap()
          .values()
          .find(|r| r.slug == slug)
          .cloned(),
      )
    }

    async fn create_super_admin_role(&self) -> Result<Role, CoreError> {
      if let Some(existing) = self.find_role("super-admin").await? {
        return Ok(existing);
      }
      Ok(self.add_role("super-admin", vec![rule("*", "*")]))
    }

    async fn get_role_permissions(
      &self,
      role_id: &RoleId,
    ) -> Result<Vec<PermissionRule>, CoreError> {
      Ok(
        self
          .role_permissions
          .lock()
          .unwrap()
          .get(role_id)
          .cloned()
          .unwrap_or_default(),
      )
    }

    async fn add_role_to_user(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), CoreError> {
      let role = self
        .roles
        .lock()
        .unwrap()
        .get(role_id)
        .cloned()
        .ok_or_else(|| CoreError::NotFound("role".into()))?;
      self.assign(user_id, &role);
      Ok(())
    }
  }

  #[tokio::test]
  async fn roles_expand_and_dedup_across_global_and_local() {
    let access = Arc::new(MemoryAccess::default());
    let user = UserId::from("u-1");

    let viewer = access.add_role(
      "viewer",
      vec![rule("GET", "/api/v1/users"), rule("read", "sessions")],
    );
    let editor = access.add_role("editor", vec![rule("update", "users")]);
    access.assign(&user, &viewer);
    // viewer is also a local role; it must count once
    let scope = ScopeContext {
      local_role_ids: vec![viewer.id.clone(), editor.id.clone()],
      ..Default::default()
    };

    let resolver = PermissionResolver::new(access);
    let ctx = resolver.resolve(&user, &scope).await.unwrap();

    assert_eq!(ctx.role_slugs, vec!["editor".to_string(), "viewer".to_string()]);
    assert!(ctx.permission_codes.contains("read:users"));
    assert!(ctx.permission_codes.contains("read:session"));
    assert!(ctx.permission_codes.contains("update:users"));
    assert!(!ctx.is_admin);
  }

  #[tokio::test]
  async fn resolution_is_order_independent() {
    let access = Arc::new(MemoryAccess::default());
    let user = UserId::from("u-1");

    let a = access.add_role("a", vec![rule("read", "users"), rule("update", "spaces")]);
    let b = access.add_role("b", vec![rule("update", "spaces"), rule("read", "users")]);
    access.assign(&user, &a);
    access.assign(&user, &b);

    let resolver = PermissionResolver::new(access);
    let forward = resolver
      .resolve(&user, &ScopeContext::default())
      .await
      .unwrap();

    let scope_reversed = ScopeContext {
      local_role_ids: vec![b.id.clone(), a.id.clone()],
      ..Default::default()
    };
    let reversed = resolver.resolve(&user, &scope_reversed).await.unwrap();

    assert_eq!(forward.permission_codes, reversed.permission_codes);
  }

  #[tokio::test]
  async fn wildcard_role_collapses_the_set() {
    let access = Arc::new(MemoryAccess::default());
    let user = UserId::from("u-1");

    let admin = access.create_super_admin_role().await.unwrap();
    let viewer = access.add_role("viewer", vec![rule("read", "users")]);
    access.assign(&user, &admin);
    access.assign(&user, &viewer);

    let resolver = PermissionResolver::new(access);
    let ctx = resolver
      .resolve(&user, &ScopeContext::default())
      .await
      .unwrap();

    assert_eq!(
      ctx.permission_codes,
      BTreeSet::from([WILDCARD_CODE.to_string()])
    );
    assert!(ctx.is_admin);
  }

  #[tokio::test]
  async fn admin_detection_covers_the_admin_slug_set() {
    for slug in ADMIN_ROLE_SLUGS {
      let access = Arc::new(MemoryAccess::default());
      let user = UserId::from("u-1");
      let role = access.add_role(slug, vec![]);
      access.assign(&user, &role);

      let resolver = PermissionResolver::new(access);
      let ctx = resolver
        .resolve(&user, &ScopeContext::default())
        .await
        .unwrap();
      assert!(ctx.is_admin, "{} should be an admin slug", slug);
    }
  }
}
