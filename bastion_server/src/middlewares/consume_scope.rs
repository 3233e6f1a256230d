//! Active-scope selection: honor the `X-Space-Id` header after a membership
//! check, otherwise keep the default scope already resolved into the token.

use axum::{
  body::Body,
  extract::{Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use tracing::warn;

use bastion_core::models::{AuthUser, SpaceId};

use crate::state::AppState;

/// Header selecting the active space for a request
pub const SPACE_HEADER: &str = "x-space-id";

pub async fn consume_scope(
  State(state): State<AppState>,
  mut req: Request<Body>,
  next: Next,
) -> Response {
  let Some(user) = req.extensions().get::<AuthUser>().cloned() else {
    return next.run(req).await;
  };

  let requested = req
    .headers()
    .get(SPACE_HEADER)
    .and_then(|h| h.to_str().ok())
    .map(|s| SpaceId::from(s.trim()));

  if let Some(requested) = requested {
    if user.space_id.as_ref() != Some(&requested) {
      // Header overrides the token's default scope, after a membership check
      match state.scope_resolver.resolve(&user.id, Some(&requested)).await {
        Ok(scope) => {
          let mut user = user;
          user.space_id = scope.space_id;
          req.extensions_mut().insert(user);
        }
        Err(e) => {
          warn!("scope selection rejected: {}", e);
          return (StatusCode::FORBIDDEN, "not a member of the requested space").into_response();
        }
      }
    }
  }

  next.run(req).await
}
