use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Specific token validation error types to provide more granular control
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenError {
  /// Signature check failed or the token is malformed
  #[error("invalid or malformed token")]
  Invalid,

  /// Token is past its expiry
  #[error("token expired")]
  Expired,

  /// Token decoded fine but carries the wrong subject for this operation
  #[error("unexpected token subject: {0}")]
  SubjectMismatch(String),

  /// The backing auth token record is disabled or missing
  #[error("token has been revoked")]
  Revoked,

  /// IP or user agent differ from the ones the token was bound to
  #[error("security context mismatch")]
  ContextMismatch,
}

/// Errors raised while reading a typed field out of decoded claims
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimsFieldError {
  #[error("missing claim field: {0}")]
  MissingField(&'static str),

  #[error("claim field has wrong type: {0}")]
  WrongType(&'static str),

  #[error("claim field is empty: {0}")]
  Empty(&'static str),
}

/// Core domain error taxonomy.
/// These errors represent business domain issues, not transport details;
/// the server crates map them onto HTTP statuses.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CoreError {
  /// Input shape violations
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// Missing or invalid credentials, dead sessions, bad tokens
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  /// Authenticated but not allowed
  #[error("forbidden: {0}")]
  Forbidden(String),

  /// Unknown entity (user, role, code, session)
  #[error("not found: {0}")]
  NotFound(String),

  /// Duplicate username/email/phone; `field` names the colliding attribute
  #[error("{field} already exists")]
  AlreadyExists { field: String },

  /// State conflicts that are not duplicates
  #[error("conflict: {0}")]
  Conflict(String),

  /// The referenced code or token is past its usable window
  #[error("expired: {0}")]
  Expired(String),

  /// MFA verification is locked out for a while
  #[error("locked out: {0}")]
  LockedOut(String),

  /// Too many failed attempts against a challenge
  #[error("max attempts exceeded: {0}")]
  MaxAttemptsExceeded(String),

  /// Validation errors for business rules
  #[error("validation error: {0}")]
  Validation(String),

  /// Database errors from sqlx
  #[error("database error: {0}")]
  Database(String),

  /// Specific token validation errors
  #[error("invalid token: {0}")]
  InvalidToken(TokenError),

  /// Internal/unexpected errors
  #[error("internal error: {0}")]
  Internal(String),
}

impl CoreError {
  /// Map sqlx database errors to specific CoreError variants
  pub fn from_database_error(error: sqlx::Error) -> Self {
    if let sqlx::Error::RowNotFound = error {
      return CoreError::NotFound("row not found".to_string());
    }

    if let Some(db_err) = error.as_database_error() {
      if db_err.is_unique_violation() {
        return Self::map_unique_constraint_error(&error.to_string());
      }

      if db_err.is_foreign_key_violation() {
        return CoreError::NotFound(format!("referenced resource not found: {}", db_err.message()));
      }

      if db_err.is_check_violation() {
        return CoreError::Validation(format!("data validation failed: {}", db_err.message()));
      }
    }

    CoreError::Database(error.to_string())
  }

  /// Map unique constraint errors to the colliding field
  fn map_unique_constraint_error(error_msg: &str) -> Self {
    let field = if error_msg.contains("users_username_key") {
      "username"
    } else if error_msg.contains("users_email_key") {
      "email"
    } else if error_msg.contains("users_phone_key") {
      "phone"
    } else if error_msg.contains("spaces_slug_key") {
      "space"
    } else if error_msg.contains("sessions_token_id_key") {
      "session"
    } else {
      return CoreError::Conflict(format!("resource already exists: {}", error_msg));
    };

    CoreError::AlreadyExists {
      field: field.to_string(),
    }
  }
}

impl From<sqlx::Error> for CoreError {
  fn from(err: sqlx::Error) -> Self {
    CoreError::from_database_error(err)
  }
}

impl From<jsonwebtoken::errors::Error> for CoreError {
  fn from(err: jsonwebtoken::errors::Error) -> Self {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
      ErrorKind::ExpiredSignature => CoreError::InvalidToken(TokenError::Expired),
      _ => CoreError::InvalidToken(TokenError::Invalid),
    }
  }
}

impl From<serde_json::Error> for CoreError {
  fn from(err: serde_json::Error) -> Self {
    CoreError::Internal(err.to_string())
  }
}

impl From<anyhow::Error> for CoreError {
  fn from(err: anyhow::Error) -> Self {
    CoreError::Internal(err.to_string())
  }
}

impl From<ClaimsFieldError> for CoreError {
  fn from(err: ClaimsFieldError) -> Self {
    CoreError::Unauthorized(err.to_string())
  }
}

pub trait ErrorMapper {
  type Error;

  fn map_error(error: CoreError) -> Self::Error;
}
