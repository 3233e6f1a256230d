//! Newtype wrappers for the opaque string identifiers used across the system.
//!
//! These types provide type safety and prevent mixing up different kinds of ids.

use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! string_id {
  ($(#[$doc:meta])* $name:ident) => {
    $(#[$doc])*
    #[derive(
      Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type, ToSchema,
    )]
    #[sqlx(transparent)]
    #[serde(transparent)]
    pub struct $name(pub String);

    impl $name {
      /// Mint a fresh random id
      pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
      }

      pub fn as_str(&self) -> &str {
        &self.0
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<String> for $name {
      fn from(id: String) -> Self {
        $name(id)
      }
    }

    impl From<&str> for $name {
      fn from(id: &str) -> Self {
        $name(id.to_string())
      }
    }

    impl From<$name> for String {
      fn from(id: $name) -> Self {
        id.0
      }
    }
  };
}

string_id!(
  /// User id newtype
  UserId
);
string_id!(
  /// Space (tenant) id newtype
  SpaceId
);
string_id!(
  /// Role id newtype
  RoleId
);
string_id!(
  /// Auth token record id; doubles as the `jti` of an access/refresh pair
  AuthTokenId
);
string_id!(
  /// Session id newtype
  SessionId
);
string_id!(
  /// Email verification code record id
  CodeAuthId
);
string_id!(
  /// Captcha challenge id newtype
  CaptchaId
);
