use axum::{
  body::Body,
  extract::{FromRequestParts, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};

use axum_extra::{
  headers::{authorization::Bearer, Authorization},
  TypedHeader,
};
use tracing::warn;

use super::TokenVerifier;
use crate::models::AuthUser;

/// Generic `T` is any application state that implements [`TokenVerifier`].
/// The function is intended to be wrapped via
/// `axum::middleware::from_fn_with_state` and therefore matches the signature
/// expected by that helper.
pub async fn verify_token_middleware<T>(
  State(state): State<T>,
  req: Request<Body>,
  next: Next,
) -> Response
where
  T: TokenVerifier + Clone + Send + Sync + 'static,
  AuthUser: From<T::Claims>,
{
  verify_token_middleware_with_user_type::<T, AuthUser>(State(state), req, next).await
}

/// Version of the middleware that allows specifying the user type
pub async fn verify_token_middleware_with_user_type<T, U>(
  State(state): State<T>,
  req: Request<Body>,
  next: Next,
) -> Response
where
  T: TokenVerifier + Clone + Send + Sync + 'static,
  U: From<T::Claims> + Clone + Send + Sync + 'static,
{
  let (mut parts, body) = req.into_parts();
  let token =
    match TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state).await {
      Ok(bearer) => bearer.token().to_string(),
      Err(e) => {
        warn!("parse Bearer token failed: {}", e);
        return (StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
      }
    };

  match state.verify_token(&token) {
    Ok(claims) => {
      let user: U = claims.into();
      let mut req = Request::from_parts(parts, body);
      req.extensions_mut().insert(user);
      next.run(req).await
    }
    Err(e) => {
      warn!("token verification failed: {:?}", e);
      (StatusCode::UNAUTHORIZED, "invalid token").into_response()
    }
  }
}
