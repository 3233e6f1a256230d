//! The policy gate: drives the external policy engine across the user's
//! principals, domains and actions, with an explicit, logged fallback when
//! the engine is missing or failing. Denials emit `security.access_denied`.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use bastion_core::contracts::{names, AccessDeniedEvent, EventBus, PolicyEngine};
use bastion_core::models::{AuthUser, SpaceId};
use bastion_core::CoreError;

use super::permissions::semantic_action_for_method;

pub struct PolicyGate {
  engine: Option<Arc<dyn PolicyEngine>>,
  events: Arc<dyn EventBus>,
}

impl PolicyGate {
  pub fn new(engine: Option<Arc<dyn PolicyEngine>>, events: Arc<dyn EventBus>) -> Self {
    Self { engine, events }
  }

  /// Authorize `user` for `method path` under `scope`. Admin roles and the
  /// absolute wildcard permission always pass.
  pub async fn authorize(
    &self,
    user: &AuthUser,
    scope: Option<&SpaceId>,
    path: &str,
    method: &str,
  ) -> Result<(), CoreError> {
    if user.is_admin || user.has_wildcard() {
      return Ok(());
    }

    match &self.engine {
      Some(engine) => match self.ask_engine(engine.as_ref(), user, scope, path, method).await {
        Ok(true) => Ok(()),
        Ok(false) => self.deny(user, scope, path, method, "policy denied").await,
        Err(e) => {
          warn!("policy engine unavailable, applying safe fallback: {}", e);
          self.fallback(user, scope, path, method).await
        }
      },
      None => self.fallback(user, scope, path, method).await,
    }
  }

  async fn ask_engine(
    &self,
    engine: &dyn PolicyEngine,
    user: &AuthUser,
    scope: Option<&SpaceId>,
    path: &str,
    method: &str,
  ) -> Result<bool, CoreError> {
    let mut principals: Vec<&str> = user.roles.iter().map(|r| r.as_str()).collect();
    principals.push(user.id.as_str());
    principals.push(user.username.as_str());

    let mut domains: Vec<&str> = Vec::with_capacity(2);
    if let Some(scope) = scope {
      domains.push(scope.as_str());
    }
    // Specific domain first, then the global fallback domain
    if !domains.contains(&"*") {
      domains.push("*");
    }

    let mut actions: Vec<&str> = vec![method];
    let semantic = semantic_action_for_method(method);
    if let Some(semantic) = semantic {
      if semantic != method {
        actions.push(semantic);
      }
    }

    for principal in &principals {
      for domain in &domains {
        for action in &actions {
          if engine.enforce(principal, domain, path, action).await? {
            return Ok(true);
          }
        }
      }
    }
    Ok(false)
  }

  /// Deny-unless fallback: only the wildcard permission or an admin role
  /// pass when the engine cannot answer. The is_admin/wildcard short-circuit
  /// already ran, so reaching this point is a deny.
  async fn fallback(
    &self,
    user: &AuthUser,
    scope: Option<&SpaceId>,
    path: &str,
    method: &str,
  ) -> Result<(), CoreError> {
    warn!(
      user_id = %user.id,
      path,
      method,
      "policy engine absent; denying non-privileged request"
    );
    self
      .deny(user, scope, path, method, "policy engine unavailable")
      .await
  }

  async fn deny(
    &self,
    user: &AuthUser,
    scope: Option<&SpaceId>,
    path: &str,
    method: &str,
    reason: &str,
  ) -> Result<(), CoreError> {
    let event = AccessDeniedEvent {
      user_id: Some(user.id.clone()),
      space_id: scope.cloned(),
      path: path.to_string(),
      method: method.to_string(),
      reason: reason.to_string(),
      timestamp: Utc::now(),
    };
    if let Ok(payload) = serde_json::to_value(&event) {
      if let Err(e) = self.events.publish(names::ACCESS_DENIED, payload).await {
        warn!("failed to publish access-denied event: {}", e);
      }
    }

    Err(CoreError::Forbidden("access denied".to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use bastion_core::models::UserId;
  use std::sync::Mutex;

  #[derive(Default)]
  struct RecordingBus {
    published: Mutex<Vec<String>>,
  }

  #[async_trait]
  impl EventBus for RecordingBus {
    async fn publish(&self, name: &str, _payload: serde_json::Value) -> Result<(), CoreError> {
      self.published.lock().unwrap().push(name.to_string());
      Ok(())
    }

    fn subscribe(&self, _name: &str, _handler: bastion_core::contracts::EventHandler) {}
  }

  /// Engine that allows a single exact (subject, domain, object, action) tuple
  struct SingleRuleEngine {
    allow: (String, String, String, String),
    fail: bool,
  }

  #[async_trait]
  impl PolicyEngine for SingleRuleEngine {
    async fn enforce(
      &self,
      subject: &str,
      domain: &str,
      object: &str,
      action: &str,
    ) -> Result<bool, CoreError> {
      if self.fail {
        return Err(CoreError::Internal("engine down".to_string()));
      }
      let (s, d, o, a) = &self.allow;
      Ok(subject == s && domain == d && object == o && action == a)
    }
  }

  fn user(roles: Vec<&str>, permissions: Vec<&str>, is_admin: bool) -> AuthUser {
    AuthUser {
      id: UserId::from("u-1"),
      username: "alice".into(),
      email: "alice@example.com".into(),
      is_admin,
      space_id: None,
      space_ids: vec![],
      roles: roles.into_iter().map(String::from).collect(),
      permissions: permissions.into_iter().map(String::from).collect(),
      status: 0,
      is_certified: false,
    }
  }

  #[tokio::test]
  async fn role_rule_in_specific_domain_allows() {
    let engine = SingleRuleEngine {
      allow: (
        "viewer".into(),
        "s1".into(),
        "/api/v1/users".into(),
        "GET".into(),
      ),
      fail: false,
    };
    let gate = PolicyGate::new(Some(Arc::new(engine)), Arc::new(RecordingBus::default()));

    gate
      .authorize(
        &user(vec!["viewer"], vec![], false),
        Some(&SpaceId::from("s1")),
        "/api/v1/users",
        "GET",
      )
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn semantic_action_and_global_domain_are_tried() {
    // Rule matches only (user-id, "*", path, "read"), so the gate must fall
    // through the role principals, the scope domain and the HTTP action first
    let engine = SingleRuleEngine {
      allow: ("u-1".into(), "*".into(), "/api/v1/users".into(), "read".into()),
      fail: false,
    };
    let gate = PolicyGate::new(Some(Arc::new(engine)), Arc::new(RecordingBus::default()));

    gate
      .authorize(
        &user(vec!["viewer"], vec![], false),
        Some(&SpaceId::from("s1")),
        "/api/v1/users",
        "GET",
      )
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn engine_denial_is_forbidden_and_published() {
    let engine = SingleRuleEngine {
      allow: ("nobody".into(), "*".into(), "/".into(), "*".into()),
      fail: false,
    };
    let bus = Arc::new(RecordingBus::default());
    let gate = PolicyGate::new(Some(Arc::new(engine)), bus.clone());

    let err = gate
      .authorize(&user(vec!["viewer"], vec![], false), None, "/api/v1/users", "GET")
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(
      bus.published.lock().unwrap().as_slice(),
      [names::ACCESS_DENIED]
    );
  }

  #[tokio::test]
  async fn failing_engine_falls_back_to_deny_for_plain_users() {
    let engine = SingleRuleEngine {
      allow: ("viewer".into(), "*".into(), "/".into(), "GET".into()),
      fail: true,
    };
    let gate = PolicyGate::new(Some(Arc::new(engine)), Arc::new(RecordingBus::default()));

    let err = gate
      .authorize(&user(vec!["viewer"], vec![], false), None, "/", "GET")
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
  }

  #[tokio::test]
  async fn fallback_admits_admins_and_wildcards() {
    let gate = PolicyGate::new(None, Arc::new(RecordingBus::default()));

    gate
      .authorize(&user(vec![], vec![], true), None, "/", "GET")
      .await
      .unwrap();
    gate
      .authorize(&user(vec![], vec!["*:*"], false), None, "/", "GET")
      .await
      .unwrap();

    let err = gate
      .authorize(&user(vec![], vec!["read:users"], false), None, "/", "GET")
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
  }
}
