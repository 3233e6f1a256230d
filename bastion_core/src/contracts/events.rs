//! Event contracts shared between the identity server and the realtime
//! fan-out. This module is the single source of truth for event names and
//! payload shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::CoreError;
use crate::models::{SessionId, SpaceId, UserId};

/// Event names published by the core
pub mod names {
  pub const USER_LOGIN: &str = "user.login";
  pub const USER_CREATED: &str = "user.created";
  pub const USER_PASSWORD_CHANGED: &str = "user.password_changed";
  pub const ACCESS_DENIED: &str = "security.access_denied";
}

/// Emitted after every committed authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginEvent {
  pub user_id: UserId,
  pub username: String,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub browser: Option<String>,
  pub os: Option<String>,
  pub mobile: bool,
  pub referer: Option<String>,
  pub session_id: SessionId,
  pub login_method: String,
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreatedEvent {
  pub user_id: UserId,
  pub username: String,
  pub email: String,
  pub space_id: Option<SpaceId>,
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChangedEvent {
  pub user_id: UserId,
  pub timestamp: DateTime<Utc>,
}

/// Emitted whenever the policy gate or a permission gate denies a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDeniedEvent {
  pub user_id: Option<UserId>,
  pub space_id: Option<SpaceId>,
  pub path: String,
  pub method: String,
  pub reason: String,
  pub timestamp: DateTime<Utc>,
}

/// Handler registered against a single event name
pub type EventHandler =
  Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, ()> + Send + Sync + 'static>;

/// The extension bus. Publishing must not block the caller beyond enqueueing;
/// handler failures stay local to the handler.
#[async_trait]
pub trait EventBus: Send + Sync {
  async fn publish(&self, name: &str, payload: serde_json::Value) -> Result<(), CoreError>;

  fn subscribe(&self, name: &str, handler: EventHandler);
}
