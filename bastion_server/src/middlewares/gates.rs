//! Permission gates and the per-request bookkeeping that runs once a
//! principal is established: policy authorization for mounted resource
//! routes, coalesced session last-access touches, and the non-blocking
//! session-limit warning. Every authorization denial emits
//! `security.access_denied`.

use axum::{
  body::Body,
  extract::{Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::warn;

use bastion_core::contracts::{names, AccessDeniedEvent};
use bastion_core::models::AuthUser;

use super::consume_user::SessionBinding;
use crate::services::permissions::permission_code_for_request;
use crate::state::AppState;

fn unauthorized() -> Response {
  (StatusCode::UNAUTHORIZED, "authentication required").into_response()
}

async fn forbidden(state: &AppState, user: Option<&AuthUser>, req: &Request<Body>) -> Response {
  let event = AccessDeniedEvent {
    user_id: user.map(|u| u.id.clone()),
    space_id: user.and_then(|u| u.space_id.clone()),
    path: req.uri().path().to_string(),
    method: req.method().as_str().to_string(),
    reason: "permission gate denied".to_string(),
    timestamp: Utc::now(),
  };
  if let Ok(payload) = serde_json::to_value(&event) {
    if let Err(e) = state.events.publish(names::ACCESS_DENIED, payload).await {
      warn!("failed to publish access-denied event: {}", e);
    }
  }

  (StatusCode::FORBIDDEN, "insufficient permissions").into_response()
}

/// Reject anonymous requests; everything behind this sees an [`AuthUser`]
pub async fn require_auth(req: Request<Body>, next: Next) -> Response {
  if req.extensions().get::<AuthUser>().is_none() {
    return unauthorized();
  }
  next.run(req).await
}

/// Reject requests that resolved no active space
pub async fn require_space(req: Request<Body>, next: Next) -> Response {
  match req.extensions().get::<AuthUser>() {
    None => unauthorized(),
    Some(user) if user.space_id.is_none() => unauthorized(),
    Some(_) => next.run(req).await,
  }
}

/// Admins and wildcard holders short-circuit every gate below
fn is_privileged(user: &AuthUser) -> bool {
  user.is_admin || user.has_wildcard()
}

pub async fn require_permission(
  State((state, code)): State<(AppState, &'static str)>,
  req: Request<Body>,
  next: Next,
) -> Response {
  match req.extensions().get::<AuthUser>().cloned() {
    None => unauthorized(),
    Some(user) if is_privileged(&user) || user.has_permission(code) => next.run(req).await,
    Some(user) => forbidden(&state, Some(&user), &req).await,
  }
}

pub async fn require_any_permission(
  State((state, codes)): State<(AppState, &'static [&'static str])>,
  req: Request<Body>,
  next: Next,
) -> Response {
  match req.extensions().get::<AuthUser>().cloned() {
    None => unauthorized(),
    Some(user) if is_privileged(&user) || codes.iter().any(|c| user.has_permission(c)) => {
      next.run(req).await
    }
    Some(user) => forbidden(&state, Some(&user), &req).await,
  }
}

pub async fn require_role(
  State((state, slug)): State<(AppState, &'static str)>,
  req: Request<Body>,
  next: Next,
) -> Response {
  match req.extensions().get::<AuthUser>().cloned() {
    None => unauthorized(),
    Some(user) if is_privileged(&user) || user.has_role(slug) => next.run(req).await,
    Some(user) => forbidden(&state, Some(&user), &req).await,
  }
}

pub async fn require_any_role(
  State((state, slugs)): State<(AppState, &'static [&'static str])>,
  req: Request<Body>,
  next: Next,
) -> Response {
  match req.extensions().get::<AuthUser>().cloned() {
    None => unauthorized(),
    Some(user) if is_privileged(&user) || user.has_any_role(slugs) => next.run(req).await,
    Some(user) => forbidden(&state, Some(&user), &req).await,
  }
}

pub async fn require_admin(
  State(state): State<AppState>,
  req: Request<Body>,
  next: Next,
) -> Response {
  match req.extensions().get::<AuthUser>().cloned() {
    None => unauthorized(),
    Some(user) if user.is_admin => next.run(req).await,
    Some(user) => forbidden(&state, Some(&user), &req).await,
  }
}

/// Gate a request on the permission code derived from its own method and
/// path, e.g. `GET /api/v1/users` needs `read:users`.
pub async fn require_request_permission(
  State(state): State<AppState>,
  req: Request<Body>,
  next: Next,
) -> Response {
  match req.extensions().get::<AuthUser>().cloned() {
    None => unauthorized(),
    Some(user) if is_privileged(&user) => next.run(req).await,
    Some(user) => {
      let allowed = permission_code_for_request(req.method().as_str(), req.uri().path())
        .map_or(false, |code| user.has_permission(&code));
      if allowed {
        next.run(req).await
      } else {
        forbidden(&state, Some(&user), &req).await
      }
    }
  }
}

/// Admit admins, `owner`/`manager` role holders, or requests whose path
/// targets the caller's own user id (`…/users/{id}/…`).
pub async fn owner_or_manager(
  State(state): State<AppState>,
  req: Request<Body>,
  next: Next,
) -> Response {
  match req.extensions().get::<AuthUser>().cloned() {
    None => unauthorized(),
    Some(user) if is_privileged(&user) || user.has_any_role(&["owner", "manager"]) => {
      next.run(req).await
    }
    Some(user) => {
      let owns_target = req
        .uri()
        .path()
        .split('/')
        .any(|segment| segment == user.id.as_str());
      if owns_target {
        next.run(req).await
      } else {
        forbidden(&state, Some(&user), &req).await
      }
    }
  }
}

/// Policy authorization for mounted resource routes (see the policy gate for
/// engine traversal and the logged safe fallback; the gate publishes its own
/// denial events).
pub async fn policy_authorize(
  State(state): State<AppState>,
  req: Request<Body>,
  next: Next,
) -> Response {
  let Some(user) = req.extensions().get::<AuthUser>().cloned() else {
    return unauthorized();
  };

  let path = req.uri().path().to_string();
  let method = req.method().as_str().to_string();
  if let Err(e) = state
    .policy_gate
    .authorize(&user, user.space_id.as_ref(), &path, &method)
    .await
  {
    warn!("policy denied {} {} for {}: {}", method, path, user.id, e);
    return (StatusCode::FORBIDDEN, "insufficient permissions").into_response();
  }

  next.run(req).await
}

/// Post-auth bookkeeping: coalesced last-access touch and the soft session
/// limit warning. Never blocks or fails the request.
pub async fn session_bookkeeping(
  State(state): State<AppState>,
  req: Request<Body>,
  next: Next,
) -> Response {
  let binding = req.extensions().get::<SessionBinding>().cloned();
  let user = req.extensions().get::<AuthUser>().cloned();

  let response = next.run(req).await;

  if let Some(binding) = binding {
    state.sessions.update_last_access(&binding.token_id).await;
  }

  if let (Some(user), Some(limit)) = (
    user,
    state.config.features.sessions.warn_session_limit,
  ) {
    match state.sessions.count_active_for_user(&user.id).await {
      Ok(count) if count > limit => {
        warn!(
          user_id = %user.id,
          count,
          limit,
          "user exceeds the concurrent session limit"
        );
      }
      Ok(_) => {}
      Err(e) => warn!("session limit check failed: {}", e),
    }
  }

  response
}

/// Mutating requests must declare a JSON body
pub async fn validate_content_type(req: Request<Body>, next: Next) -> Response {
  let method = req.method();
  let mutating = matches!(method.as_str(), "POST" | "PUT" | "PATCH");
  let has_body = req
    .headers()
    .get("content-length")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.parse::<u64>().ok())
    .map_or(false, |len| len > 0);

  if mutating && has_body {
    let is_json = req
      .headers()
      .get("content-type")
      .and_then(|v| v.to_str().ok())
      .map_or(false, |ct| ct.starts_with("application/json"));
    if !is_json {
      return (
        StatusCode::UNSUPPORTED_MEDIA_TYPE,
        "content-type must be application/json",
      )
        .into_response();
    }
  }

  next.run(req).await
}
