use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{AuthTokenId, SessionId, UserId};

/// Device-scoped binding of a user to an auth token record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Session {
  pub id: SessionId,
  pub user_id: UserId,
  pub token_id: AuthTokenId,
  pub device_info: Option<String>,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub location: Option<String>,
  pub login_method: Option<String>,
  pub is_active: bool,
  pub last_access_at: Option<DateTime<Utc>>,
  pub expires_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Session {
  /// A session is usable for authentication only while active and unexpired
  pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
    self.is_active && self.expires_at.map_or(true, |exp| exp > now)
  }
}

/// Fields captured when a session is created on successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
  pub user_id: UserId,
  pub device_info: Option<String>,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub location: Option<String>,
  pub login_method: Option<String>,
}

/// Partial update applied by `SessionStore::update`
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
  pub last_access_at: Option<DateTime<Utc>>,
  pub location: Option<String>,
  pub is_active: Option<bool>,
  pub device_info: Option<String>,
}

impl SessionPatch {
  pub fn is_empty(&self) -> bool {
    self.last_access_at.is_none()
      && self.location.is_none()
      && self.is_active.is_none()
      && self.device_info.is_none()
  }
}

/// Pagination direction relative to the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListDirection {
  /// Newer-first, strictly older than the cursor position
  Forward,
  /// Older-first, strictly newer than the cursor position
  Backward,
}

impl Default for ListDirection {
  fn default() -> Self {
    ListDirection::Forward
  }
}

/// Parameters for cursor-based session listing
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SessionListParams {
  pub user_id: Option<UserId>,
  pub cursor: Option<String>,
  #[serde(default)]
  pub direction: Option<ListDirection>,
  pub limit: Option<i64>,
}

/// One page of sessions plus the cursor for the next page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionPage {
  pub items: Vec<Session>,
  pub next_cursor: Option<String>,
  pub has_more: bool,
}
