//! Authentication endpoints: login, the MFA exchange, email-code flows,
//! registration, refresh and logout. Handlers coordinate HTTP concerns
//! (context extraction, cookies) and delegate the flows to the auth service.

use axum::{
  extract::{Extension, Path, State},
  http::{header, HeaderMap, HeaderValue, StatusCode},
  response::IntoResponse,
  Json,
};
use validator::Validate;

use bastion_core::models::{
  AuthContext, AuthResponse, LoginPayload, MfaVerifyPayload, RefreshPayload, RegisterPayload,
  SendCodePayload, SessionId,
};

use crate::error::AppError;
use crate::middlewares::SessionBinding;
use crate::state::AppState;

const SESSION_COOKIE: &str = "session_id";

/// Pull the network and device context out of the request headers
pub fn extract_auth_context(headers: &HeaderMap) -> AuthContext {
  let header_value = |name: &str| {
    headers
      .get(name)
      .and_then(|h| h.to_str().ok())
      .map(String::from)
  };

  let ip_address = header_value("x-forwarded-for")
    .map(|raw| raw.split(',').next().unwrap_or(&raw).trim().to_string())
    .or_else(|| header_value("x-real-ip"));

  AuthContext {
    ip_address,
    user_agent: header_value("user-agent"),
    referer: header_value("referer"),
    device_info: header_value("x-device-info"),
  }
}

/// Session cookie scoped to the request host
fn set_session_cookie(
  headers: &mut HeaderMap,
  request_headers: &HeaderMap,
  session_id: &SessionId,
) -> Result<(), AppError> {
  let domain = request_headers
    .get(header::HOST)
    .and_then(|h| h.to_str().ok())
    .map(|host| host.split(':').next().unwrap_or(host).to_string());

  let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session_id);
  if let Some(domain) = domain {
    cookie.push_str("; Domain=");
    cookie.push_str(&domain);
  }

  let value = HeaderValue::from_str(&cookie)
    .map_err(|_| AppError::Internal("failed to build session cookie".to_string()))?;
  headers.insert(header::SET_COOKIE, value);
  Ok(())
}

fn clear_session_cookie(headers: &mut HeaderMap) {
  let cookie = format!(
    "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly",
    SESSION_COOKIE
  );
  if let Ok(value) = HeaderValue::from_str(&cookie) {
    headers.insert(header::SET_COOKIE, value);
  }
}

fn respond_with_session(
  request_headers: &HeaderMap,
  response: AuthResponse,
) -> Result<impl IntoResponse, AppError> {
  let mut headers = HeaderMap::new();
  if let Some(session_id) = &response.session_id {
    set_session_cookie(&mut headers, request_headers, session_id)?;
  }
  Ok((StatusCode::OK, headers, Json(response)))
}

#[utoipa::path(
  post,
  path = "/api/v1/login",
  request_body = LoginPayload,
  responses(
    (status = 200, description = "Tokens issued, or an MFA challenge / code-sent marker", body = AuthResponse),
    (status = 401, description = "Bad credentials or disabled account"),
    (status = 429, description = "Captcha attempts exhausted")
  ),
  tag = "auth"
)]
pub async fn login_handler(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
  payload.validate()?;
  let ctx = extract_auth_context(&headers);

  let response = state.auth.login(payload, &ctx).await?;
  respond_with_session(&headers, response)
}

#[utoipa::path(
  post,
  path = "/api/v1/login/mfa",
  request_body = MfaVerifyPayload,
  responses(
    (status = 200, description = "Challenge exchanged for tokens", body = AuthResponse),
    (status = 401, description = "Bad challenge, code, or client mismatch"),
    (status = 423, description = "Verification locked out")
  ),
  tag = "auth"
)]
pub async fn mfa_login_handler(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(payload): Json<MfaVerifyPayload>,
) -> Result<impl IntoResponse, AppError> {
  payload.validate()?;
  let ctx = extract_auth_context(&headers);

  let response = state.auth.mfa_verify(payload, &ctx).await?;
  respond_with_session(&headers, response)
}

#[utoipa::path(
  post,
  path = "/api/v1/register",
  request_body = RegisterPayload,
  responses(
    (status = 200, description = "Account created, tokens issued", body = AuthResponse),
    (status = 409, description = "Username, email or phone already taken"),
    (status = 410, description = "Register token or code already consumed")
  ),
  tag = "auth"
)]
pub async fn register_handler(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
  payload.validate()?;
  let ctx = extract_auth_context(&headers);

  let response = state.auth.register(payload, &ctx).await?;
  respond_with_session(&headers, response)
}

#[utoipa::path(
  post,
  path = "/api/v1/refresh",
  request_body = RefreshPayload,
  responses(
    (status = 200, description = "Fresh token pair and session", body = AuthResponse),
    (status = 401, description = "Refresh token invalid or revoked")
  ),
  tag = "auth"
)]
pub async fn refresh_handler(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(payload): Json<RefreshPayload>,
) -> Result<impl IntoResponse, AppError> {
  let refresh_token = payload
    .refresh_token
    .ok_or_else(|| AppError::InvalidRequest("refresh_token is required".to_string()))?;
  let ctx = extract_auth_context(&headers);

  let response = state.auth.refresh(&refresh_token, &ctx).await?;
  respond_with_session(&headers, response)
}

#[utoipa::path(
  post,
  path = "/api/v1/logout",
  responses((status = 204, description = "Session deactivated, token family disabled")),
  tag = "auth"
)]
pub async fn logout_handler(
  State(state): State<AppState>,
  binding: Option<Extension<SessionBinding>>,
) -> Result<impl IntoResponse, AppError> {
  if let Some(Extension(binding)) = binding {
    state.auth.logout(&binding.token_id).await?;
  }

  let mut headers = HeaderMap::new();
  clear_session_cookie(&mut headers);
  Ok((StatusCode::NO_CONTENT, headers))
}

#[utoipa::path(
  post,
  path = "/api/v1/authorize/send",
  request_body = SendCodePayload,
  responses(
    (status = 200, description = "Code mailed; body says whether the address is registered", body = AuthResponse)
  ),
  tag = "auth"
)]
pub async fn send_code_handler(
  State(state): State<AppState>,
  Json(payload): Json<SendCodePayload>,
) -> Result<Json<AuthResponse>, AppError> {
  payload.validate()?;
  let response = state.auth.send_login_code(&payload.email).await?;
  Ok(Json(response))
}

#[utoipa::path(
  get,
  path = "/api/v1/authorize/{code}",
  params(("code" = String, Path, description = "Mailed single-use code")),
  responses(
    (status = 200, description = "Tokens for known accounts, a register token otherwise", body = AuthResponse),
    (status = 404, description = "Unknown code"),
    (status = 410, description = "Code expired or already used")
  ),
  tag = "auth"
)]
pub async fn exchange_code_handler(
  State(state): State<AppState>,
  headers: HeaderMap,
  Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
  let ctx = extract_auth_context(&headers);
  let response = state.auth.exchange_code(&code, &ctx).await?;
  respond_with_session(&headers, response)
}
