use axum::{
  body::Body,
  extract::{Query, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use super::TokenVerifier;
use crate::models::AuthUser;

#[derive(Deserialize)]
pub struct TokenQuery {
  pub token: String,
}

/// Token verification middleware that authenticates through a `?token=`
/// query parameter. Used where headers cannot be customized, such as
/// WebSocket upgrades initiated by browsers.
pub async fn verify_query_token_middleware<T>(
  State(state): State<T>,
  req: Request<Body>,
  next: Next,
) -> Response
where
  T: TokenVerifier + Clone + Send + Sync + 'static,
  AuthUser: From<T::Claims>,
{
  let (parts, body) = req.into_parts();

  let query = match Query::<TokenQuery>::try_from_uri(&parts.uri) {
    Ok(Query(q)) => q,
    Err(e) => {
      warn!("failed to parse token from query: {}", e);
      return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }
  };

  match state.verify_token(&query.token) {
    Ok(claims) => {
      let user: AuthUser = claims.into();
      let mut req = Request::from_parts(parts, body);
      req.extensions_mut().insert(user);
      next.run(req).await
    }
    Err(e) => {
      warn!("query token verification failed: {:?}", e);
      (StatusCode::UNAUTHORIZED, "invalid token").into_response()
    }
  }
}
