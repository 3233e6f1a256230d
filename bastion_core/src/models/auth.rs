use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{SessionId, Space, SpaceId};

/// MFA mechanisms a challenge can be answered with
pub const MFA_METHODS: [&str; 2] = ["totp", "recovery_code"];

/// Network and device context observed on an authentication request
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub referer: Option<String>,
  pub device_info: Option<String>,
}

/// Token type carried in an [`AuthResponse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TokenType {
  Bearer,
  Register,
}

/// The single response shape for login, MFA exchange, register and refresh.
/// Optional fields are omitted from the wire when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub registered: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub access_token: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub refresh_token: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_id: Option<SessionId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub token_type: Option<TokenType>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires_in: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub space_ids: Option<Vec<SpaceId>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default_space: Option<Space>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mfa_required: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mfa_token: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mfa_methods: Option<Vec<String>>,
}

impl AuthResponse {
  /// Response telling the client to continue with the MFA exchange
  pub fn mfa_challenge(mfa_token: String) -> Self {
    Self {
      mfa_required: Some(true),
      mfa_token: Some(mfa_token),
      mfa_methods: Some(MFA_METHODS.iter().map(|m| m.to_string()).collect()),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
  #[validate(length(min = 1))]
  pub username: String,
  #[validate(length(min = 1))]
  pub password: String,
  pub captcha_id: Option<String>,
  pub captcha_answer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MfaVerifyPayload {
  #[validate(length(min = 1))]
  pub mfa_token: String,
  pub code: Option<String>,
  pub recovery_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterPayload {
  #[validate(length(min = 1))]
  pub register_token: String,
  #[validate(length(min = 3, max = 64))]
  pub username: String,
  pub display_name: Option<String>,
  pub phone: Option<String>,
  /// Optional name for a space to bootstrap around the new user
  pub space: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshPayload {
  pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SendCodePayload {
  #[validate(email)]
  pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdatePasswordPayload {
  pub old_password: Option<String>,
  #[validate(length(min = 8, max = 128))]
  pub new_password: String,
}
