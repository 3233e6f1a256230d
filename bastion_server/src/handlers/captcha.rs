//! Captcha endpoints. The store owns answers and attempt budgets; the media
//! rendering comes from the wired renderer collaborator.

use axum::{
  extract::{Path, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use bastion_core::models::{CaptchaId, CaptchaKind};

use crate::error::AppError;
use crate::state::AppState;

const ANSWER_LEN: usize = 4;
// No confusable glyphs (0/o, 1/l/i)
const ANSWER_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateCaptchaPayload {
  #[serde(rename = "type")]
  pub kind: Option<CaptchaKind>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateCaptchaResponse {
  pub id: String,
  pub url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCaptchaPayload {
  pub id: String,
  pub answer: String,
}

fn generate_answer() -> String {
  let mut rng = rand::thread_rng();
  (0..ANSWER_LEN)
    .map(|_| ANSWER_ALPHABET[rng.gen_range(0..ANSWER_ALPHABET.len())] as char)
    .collect()
}

#[utoipa::path(
  post,
  path = "/api/v1/captcha/generate",
  request_body = GenerateCaptchaPayload,
  responses((status = 200, body = GenerateCaptchaResponse)),
  tag = "captcha"
)]
pub async fn generate_handler(
  State(state): State<AppState>,
  Json(payload): Json<GenerateCaptchaPayload>,
) -> Result<Json<GenerateCaptchaResponse>, AppError> {
  let store = state
    .captcha
    .as_ref()
    .ok_or_else(|| AppError::InvalidRequest("captcha is not enabled".to_string()))?;

  let kind = payload.kind.unwrap_or(CaptchaKind::Png);
  let captcha = store.set(&generate_answer(), kind).await?;

  let extension = match kind {
    CaptchaKind::Png => "png",
    CaptchaKind::Wav => "wav",
  };
  let url = format!(
    "{}/api/v1/captcha/{}.{}",
    state.config.server.base_url.trim_end_matches('/'),
    captcha.id,
    extension
  );

  Ok(Json(GenerateCaptchaResponse {
    id: captcha.id.0,
    url,
  }))
}

#[utoipa::path(
  get,
  path = "/api/v1/captcha/{spec}",
  params(("spec" = String, Path, description = "`<id>.png` or `<id>.wav`")),
  responses(
    (status = 200, description = "Rendered captcha media"),
    (status = 404, description = "Unknown or expired captcha")
  ),
  tag = "captcha"
)]
pub async fn media_handler(
  State(state): State<AppState>,
  Path(spec): Path<String>,
) -> Result<impl IntoResponse, AppError> {
  let store = state
    .captcha
    .as_ref()
    .ok_or_else(|| AppError::InvalidRequest("captcha is not enabled".to_string()))?;
  let renderer = state
    .captcha_renderer
    .as_ref()
    .ok_or_else(|| AppError::Internal("no captcha renderer wired".to_string()))?;

  let (id, kind) = match spec.rsplit_once('.') {
    Some((id, "png")) => (id, CaptchaKind::Png),
    Some((id, "wav")) => (id, CaptchaKind::Wav),
    _ => return Err(AppError::InvalidRequest("unknown media type".to_string())),
  };

  let captcha = store
    .get(&CaptchaId::from(id))
    .await?
    .ok_or_else(|| AppError::NotFound("captcha not found".to_string()))?;

  let media = renderer.render(kind, &captcha.answer)?;
  let content_type = match kind {
    CaptchaKind::Png => "image/png",
    CaptchaKind::Wav => "audio/wav",
  };

  Ok((
    StatusCode::OK,
    [
      (header::CONTENT_TYPE, content_type),
      (header::CACHE_CONTROL, "no-store"),
    ],
    media,
  ))
}

#[utoipa::path(
  post,
  path = "/api/v1/captcha/validate",
  request_body = ValidateCaptchaPayload,
  responses(
    (status = 204, description = "Answer accepted; the captcha is spent"),
    (status = 400, description = "Wrong answer"),
    (status = 429, description = "Attempts exhausted")
  ),
  tag = "captcha"
)]
pub async fn validate_handler(
  State(state): State<AppState>,
  Json(payload): Json<ValidateCaptchaPayload>,
) -> Result<impl IntoResponse, AppError> {
  let store = state
    .captcha
    .as_ref()
    .ok_or_else(|| AppError::InvalidRequest("captcha is not enabled".to_string()))?;

  store
    .verify(&CaptchaId::from(payload.id), &payload.answer)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn answers_use_the_unambiguous_alphabet() {
    for _ in 0..50 {
      let answer = generate_answer();
      assert_eq!(answer.len(), ANSWER_LEN);
      assert!(answer.bytes().all(|b| ANSWER_ALPHABET.contains(&b)));
    }
  }
}
