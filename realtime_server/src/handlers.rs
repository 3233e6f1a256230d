//! HTTP surface next to the WebSocket endpoint: liveness, online-user
//! inspection, and an admin-only broadcast injection point.

use axum::{
  extract::{Extension, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use serde::{Deserialize, Serialize};

use bastion_core::models::AuthUser;

use crate::error::RealtimeError;
use crate::hub::WireMessage;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
  pub online_users: Vec<String>,
  pub connection_count: usize,
}

pub async fn online_users_handler(
  State(state): State<AppState>,
  Extension(_user): Extension<AuthUser>,
) -> Json<OnlineUsersResponse> {
  let online_users = state
    .hub
    .online_users()
    .await
    .into_iter()
    .map(|id| id.0)
    .collect();

  Json(OnlineUsersResponse {
    online_users,
    connection_count: state.hub.client_count().await,
  })
}

#[derive(Debug, Deserialize)]
pub struct BroadcastPayload {
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub channel: Option<String>,
  pub data: Option<serde_json::Value>,
  /// When set, deliver to this user's connections instead of a channel
  pub user_id: Option<String>,
}

pub async fn broadcast_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Json(payload): Json<BroadcastPayload>,
) -> Result<impl IntoResponse, RealtimeError> {
  if !user.is_admin {
    return Err(RealtimeError::Forbidden(
      "broadcast requires an admin role".to_string(),
    ));
  }

  let message = WireMessage {
    kind: payload.kind.unwrap_or_else(|| "event".to_string()),
    channel: payload.channel,
    data: payload.data,
  };

  match payload.user_id {
    Some(user_id) => state
      .hub
      .send_to_user(bastion_core::models::UserId::from(user_id), message),
    None => state.hub.broadcast(message),
  }

  Ok(StatusCode::ACCEPTED)
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
  Json(serde_json::json!({
    "status": "healthy",
    "service": "realtime_server",
    "version": env!("CARGO_PKG_VERSION"),
    "connections": state.hub.client_count().await,
  }))
}
