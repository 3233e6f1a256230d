//! TOTP two-factor management for the signed-in account. Setup returns the
//! secret and provisioning URI exactly once; verify completes enablement and
//! returns the recovery codes exactly once; everything privileged requires a
//! fresh factor.

use axum::{
  extract::{Extension, State},
  Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use bastion_core::models::AuthUser;

use crate::error::AppError;
use crate::services::mfa::{MfaFactor, MfaSetup, MfaStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TotpCodePayload {
  pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FactorPayload {
  pub code: Option<String>,
  pub recovery_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveryCodesResponse {
  pub recovery_codes: Vec<String>,
}

#[utoipa::path(
  get,
  path = "/api/v1/account/2fa/status",
  responses((status = 200, body = MfaStatus)),
  tag = "two-factor"
)]
pub async fn status_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
) -> Result<Json<MfaStatus>, AppError> {
  Ok(Json(state.mfa.status(&user.id).await?))
}

#[utoipa::path(
  post,
  path = "/api/v1/account/2fa/setup",
  responses(
    (status = 200, description = "Secret and provisioning URI, shown once", body = MfaSetup),
    (status = 409, description = "Already enabled")
  ),
  tag = "two-factor"
)]
pub async fn setup_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
) -> Result<Json<MfaSetup>, AppError> {
  let setup = state.mfa.setup(&user.id, &user.email).await?;
  Ok(Json(setup))
}

#[utoipa::path(
  post,
  path = "/api/v1/account/2fa/verify",
  request_body = TotpCodePayload,
  responses(
    (status = 200, description = "Enabled; recovery codes shown once", body = RecoveryCodesResponse),
    (status = 401, description = "Wrong code")
  ),
  tag = "two-factor"
)]
pub async fn verify_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Json(payload): Json<TotpCodePayload>,
) -> Result<Json<RecoveryCodesResponse>, AppError> {
  let recovery_codes = state.mfa.verify_setup(&user.id, &payload.code).await?;
  Ok(Json(RecoveryCodesResponse { recovery_codes }))
}

#[utoipa::path(
  post,
  path = "/api/v1/account/2fa/disable",
  request_body = FactorPayload,
  responses(
    (status = 200, description = "Disabled"),
    (status = 423, description = "Verification locked out")
  ),
  tag = "two-factor"
)]
pub async fn disable_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Json(payload): Json<FactorPayload>,
) -> Result<Json<MfaStatus>, AppError> {
  let factor = MfaFactor::from_parts(payload.code, payload.recovery_code)?;
  state.mfa.disable(&user.id, &factor).await?;
  Ok(Json(state.mfa.status(&user.id).await?))
}

#[utoipa::path(
  get,
  path = "/api/v1/account/2fa/backup-codes",
  responses((status = 200, description = "Remaining recovery-code count", body = MfaStatus)),
  tag = "two-factor"
)]
pub async fn backup_codes_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
) -> Result<Json<MfaStatus>, AppError> {
  Ok(Json(state.mfa.status(&user.id).await?))
}

#[utoipa::path(
  post,
  path = "/api/v1/account/2fa/backup-codes/regenerate",
  request_body = FactorPayload,
  responses(
    (status = 200, description = "A fresh recovery-code set, shown once", body = RecoveryCodesResponse)
  ),
  tag = "two-factor"
)]
pub async fn regenerate_backup_codes_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Json(payload): Json<FactorPayload>,
) -> Result<Json<RecoveryCodesResponse>, AppError> {
  let factor = MfaFactor::from_parts(payload.code, payload.recovery_code)?;
  let recovery_codes = state
    .mfa
    .regenerate_recovery_codes(&user.id, &factor)
    .await?;
  Ok(Json(RecoveryCodesResponse { recovery_codes }))
}
