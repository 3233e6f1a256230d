use axum::http::StatusCode;
use axum::response::Json;
use axum::{
  body::Body,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use bastion_core::error::{CoreError, TokenError};
use thiserror::Error;

/// Body shape for every error the server emits. Human message only;
/// stack traces, SQL and secrets never cross this boundary.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorOutput {
  pub code: u16,
  pub error: String,
}

impl ErrorOutput {
  pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
    Self {
      code: status.as_u16(),
      error: error.into(),
    }
  }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("{0} already exists")]
  AlreadyExists(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("expired: {0}")]
  Expired(String),

  #[error("locked out: {0}")]
  LockedOut(String),

  #[error("max attempts exceeded: {0}")]
  MaxAttemptsExceeded(String),

  #[error("sqlx error: {0}")]
  SqlxError(#[from] sqlx::Error),

  #[error("internal error: {0}")]
  AnyError(#[from] anyhow::Error),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<CoreError> for AppError {
  fn from(error: CoreError) -> Self {
    match error {
      CoreError::InvalidRequest(e) | CoreError::Validation(e) => AppError::InvalidRequest(e),
      CoreError::Unauthorized(e) => AppError::Unauthorized(e),
      CoreError::Forbidden(e) => AppError::Forbidden(e),
      CoreError::NotFound(e) => AppError::NotFound(e),
      CoreError::AlreadyExists { field } => AppError::AlreadyExists(field),
      CoreError::Conflict(e) => AppError::Conflict(e),
      CoreError::Expired(e) => AppError::Expired(e),
      CoreError::LockedOut(e) => AppError::LockedOut(e),
      CoreError::MaxAttemptsExceeded(e) => AppError::MaxAttemptsExceeded(e),
      CoreError::InvalidToken(e) => match e {
        TokenError::Expired => AppError::Unauthorized("token expired".to_string()),
        other => AppError::Unauthorized(other.to_string()),
      },
      CoreError::Database(e) => AppError::Internal(e),
      CoreError::Internal(e) => AppError::Internal(e),
    }
  }
}

impl From<validator::ValidationErrors> for AppError {
  fn from(errors: validator::ValidationErrors) -> Self {
    AppError::InvalidRequest(errors.to_string())
  }
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::AlreadyExists(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::Expired(_) => StatusCode::GONE,
      AppError::LockedOut(_) => StatusCode::LOCKED,
      AppError::MaxAttemptsExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
      AppError::SqlxError(_) | AppError::AnyError(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response<Body> {
    let status = self.status();

    // Internal causes are logged server-side and replaced with a generic body
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
      tracing::error!("internal error: {}", self);
      "internal server error".to_string()
    } else {
      self.to_string()
    };

    (status, Json(ErrorOutput::new(status, message))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn core_error_kinds_map_to_expected_statuses() {
    let cases: Vec<(CoreError, StatusCode)> = vec![
      (
        CoreError::InvalidRequest("x".into()),
        StatusCode::BAD_REQUEST,
      ),
      (CoreError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
      (CoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
      (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
      (
        CoreError::AlreadyExists {
          field: "email".into(),
        },
        StatusCode::CONFLICT,
      ),
      (CoreError::Expired("x".into()), StatusCode::GONE),
      (CoreError::LockedOut("x".into()), StatusCode::LOCKED),
      (
        CoreError::MaxAttemptsExceeded("x".into()),
        StatusCode::TOO_MANY_REQUESTS,
      ),
      (
        CoreError::InvalidToken(TokenError::Expired),
        StatusCode::UNAUTHORIZED,
      ),
      (
        CoreError::Internal("x".into()),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
    ];

    for (err, status) in cases {
      assert_eq!(AppError::from(err).status(), status);
    }
  }

  #[test]
  fn internal_details_do_not_leak() {
    let response =
      AppError::Internal("SELECT * FROM users failed: password=hunter2".into()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn already_exists_names_the_field() {
    let err = AppError::from(CoreError::AlreadyExists {
      field: "username".into(),
    });
    assert_eq!(err.to_string(), "username already exists");
  }
}
