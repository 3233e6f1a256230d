mod bearer_auth;
mod query_token_auth;
mod request_id;

pub use bearer_auth::{verify_token_middleware, verify_token_middleware_with_user_type};
pub use query_token_auth::verify_query_token_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};

/// Anything that can turn a bearer token into claims. Application states
/// implement this so the generic middlewares below can be wrapped with
/// `axum::middleware::from_fn_with_state`.
pub trait TokenVerifier {
  type Error: std::fmt::Debug;
  type Claims;

  fn verify_token(&self, token: &str) -> Result<Self::Claims, Self::Error>;
}
