use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use bastion_core::{CoreError, ErrorMapper};

#[derive(Error, Debug)]
pub enum RealtimeError {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ErrorMapper for RealtimeError {
  type Error = RealtimeError;

  fn map_error(error: CoreError) -> Self::Error {
    match error {
      CoreError::Unauthorized(e) => RealtimeError::Unauthorized(e),
      CoreError::InvalidToken(e) => RealtimeError::Unauthorized(e.to_string()),
      CoreError::Forbidden(e) => RealtimeError::Forbidden(e),
      CoreError::InvalidRequest(e) | CoreError::Validation(e) => RealtimeError::InvalidRequest(e),
      other => RealtimeError::Internal(other.to_string()),
    }
  }
}

impl IntoResponse for RealtimeError {
  fn into_response(self) -> Response {
    let status = match &self {
      RealtimeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      RealtimeError::Forbidden(_) => StatusCode::FORBIDDEN,
      RealtimeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
      RealtimeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
      tracing::error!("internal error: {}", self);
      "internal server error".to_string()
    } else {
      self.to_string()
    };

    (
      status,
      Json(serde_json::json!({ "code": status.as_u16(), "error": message })),
    )
      .into_response()
  }
}
