//! The account surface: profile projection, password change, spaces.

use axum::{
  extract::{Extension, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use validator::Validate;

use bastion_core::models::{AuthUser, Space, UpdatePasswordPayload};

use crate::error::AppError;
use crate::services::auth::MeResponse;
use crate::state::AppState;

#[utoipa::path(
  get,
  path = "/api/v1/account",
  responses((status = 200, description = "The caller's account projection", body = MeResponse)),
  tag = "account"
)]
pub async fn me_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>, AppError> {
  let me = state.auth.me(&user.id, user.space_id.as_ref()).await?;
  Ok(Json(me))
}

#[utoipa::path(
  put,
  path = "/api/v1/account/password",
  request_body = UpdatePasswordPayload,
  responses(
    (status = 204, description = "Password updated"),
    (status = 401, description = "Old password rejected")
  ),
  tag = "account"
)]
pub async fn update_password_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Json(payload): Json<UpdatePasswordPayload>,
) -> Result<impl IntoResponse, AppError> {
  payload.validate()?;
  state.auth.update_password(&user.id, payload).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
  get,
  path = "/api/v1/account/spaces",
  responses((status = 200, description = "Spaces the caller belongs to", body = [Space])),
  tag = "account"
)]
pub async fn spaces_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Space>>, AppError> {
  let spaces = state.auth.user_spaces(&user.id).await?;
  Ok(Json(spaces))
}
