mod account;
mod auth;
mod captcha;
mod sessions;
mod two_factor;

use axum::{http::StatusCode, response::IntoResponse, Json};

pub use account::*;
pub use auth::*;
pub use captcha::*;
pub use sessions::*;
pub use two_factor::*;

pub async fn health_handler() -> impl IntoResponse {
  (
    StatusCode::OK,
    Json(serde_json::json!({
      "status": "healthy",
      "service": "bastion_server",
      "version": env!("CARGO_PKG_VERSION"),
    })),
  )
}
