//! Credential consumption: bearer token, `?token=` query or session cookie.
//!
//! Token-carrying requests are authenticated directly from claims; session
//! cookies load the session and rebuild the principal from the stores. Stale
//! access tokens are re-issued in flight via the `X-Renewed-Token` response
//! header. Requests carrying no credentials continue anonymously; the gates
//! decide whether that is acceptable for the route.

use axum::{
  body::Body,
  extract::{Request, State},
  http::{header::AUTHORIZATION, HeaderValue, StatusCode},
  middleware::Next,
  response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use tracing::warn;

use bastion_core::models::{AuthTokenId, AuthUser, SessionId};

use super::whitelist::is_whitelisted;
use crate::state::AppState;

/// Response header carrying a renewed access token
pub const RENEWED_TOKEN_HEADER: &str = "x-renewed-token";

const SESSION_COOKIE: &str = "session_id";

/// Identifies the credential a request authenticated with, for last-access
/// updates and logout.
#[derive(Debug, Clone)]
pub struct SessionBinding {
  pub token_id: AuthTokenId,
  pub session_id: Option<SessionId>,
}

pub async fn consume_user(
  State(state): State<AppState>,
  req: Request<Body>,
  next: Next,
) -> Response {
  if is_whitelisted(
    &state.config.features.whitelist,
    req.method().as_str(),
    req.uri().path(),
  ) {
    return next.run(req).await;
  }

  if let Some(token) = extract_token(&req) {
    return consume_token(&state, &token, req, next).await;
  }

  if let Some(session_id) = cookie_value(&req, SESSION_COOKIE) {
    return consume_session(&state, session_id, req, next).await;
  }

  // Anonymous; gates will reject where authentication is required
  next.run(req).await
}

async fn consume_token(
  state: &AppState,
  token: &str,
  mut req: Request<Body>,
  next: Next,
) -> Response {
  let claims = match state.token_manager.verify_access_token(token) {
    Ok(claims) => claims,
    Err(e) => {
      warn!("access token rejected: {}", e);
      return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
  };

  // Re-issue when the token has aged past the staleness window
  let stale_after = state.config.auth.stale_after_secs;
  let renewed = if Utc::now().timestamp() - claims.iat > stale_after {
    let threshold = Duration::seconds(state.config.auth.access_token_ttl - stale_after);
    state
      .token_manager
      .refresh_if_needed(token, threshold)
      .unwrap_or_default()
  } else {
    None
  };

  let binding = SessionBinding {
    token_id: claims.jti.clone(),
    session_id: None,
  };
  let user: AuthUser = claims.into();
  req.extensions_mut().insert(user);
  req.extensions_mut().insert(binding);

  let mut response = next.run(req).await;
  if let Some(renewed) = renewed {
    if let Ok(value) = HeaderValue::from_str(&renewed) {
      response.headers_mut().insert(RENEWED_TOKEN_HEADER, value);
    }
  }
  response
}

async fn consume_session(
  state: &AppState,
  session_id: String,
  mut req: Request<Body>,
  next: Next,
) -> Response {
  let session = match state.sessions.get_by_id(&SessionId::from(session_id)).await {
    Ok(Some(session)) => session,
    Ok(None) => return (StatusCode::UNAUTHORIZED, "unknown session").into_response(),
    Err(e) => {
      warn!("session lookup failed: {}", e);
      return (StatusCode::UNAUTHORIZED, "unknown session").into_response();
    }
  };

  if !session.is_usable(Utc::now()) {
    return (StatusCode::UNAUTHORIZED, "session is no longer active").into_response();
  }

  let user = match state.auth.auth_user_from_session(&session).await {
    Ok(user) => user,
    Err(e) => {
      warn!("session principal rebuild failed: {}", e);
      return (StatusCode::UNAUTHORIZED, "session is no longer active").into_response();
    }
  };

  let binding = SessionBinding {
    token_id: session.token_id.clone(),
    session_id: Some(session.id.clone()),
  };
  req.extensions_mut().insert(user);
  req.extensions_mut().insert(binding);

  next.run(req).await
}

fn extract_token(req: &Request<Body>) -> Option<String> {
  if let Some(header) = req.headers().get(AUTHORIZATION) {
    if let Ok(value) = header.to_str() {
      if let Some(token) = value.strip_prefix("Bearer ") {
        return Some(token.trim().to_string());
      }
    }
  }

  // `?token=` fallback for clients that cannot set headers
  let query = req.uri().query()?;
  for pair in query.split('&') {
    if let Some((key, value)) = pair.split_once('=') {
      if key == "token" && !value.is_empty() {
        return Some(value.to_string());
      }
    }
  }
  None
}

fn cookie_value(req: &Request<Body>, name: &str) -> Option<String> {
  req
    .headers()
    .get("cookie")?
    .to_str()
    .ok()?
    .split(';')
    .map(|s| s.trim())
    .find_map(|cookie| {
      let (n, v) = cookie.split_once('=')?;
      (n == name).then(|| v.to_string())
    })
}
