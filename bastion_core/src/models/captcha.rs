use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::CaptchaId;

/// Captcha challenges live this long in the cache
pub const CAPTCHA_TTL_SECS: u64 = 300;
/// A captcha dies after this many failed answers
pub const CAPTCHA_MAX_ATTEMPTS: i64 = 3;

/// Rendered media kind for a captcha challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaKind {
  Png,
  Wav,
}

/// Cache-only captcha challenge; the answer never leaves the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Captcha {
  pub id: CaptchaId,
  pub answer: String,
  pub kind: CaptchaKind,
}
