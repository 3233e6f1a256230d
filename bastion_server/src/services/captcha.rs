//! Cache-only captcha challenges with attempt accounting.
//!
//! The answer and the attempt counter live under separate keys sharing the
//! 5 minute TTL. Three wrong answers burn the challenge; a correct answer
//! commits deletion before the success result is returned, so a verified
//! captcha can never answer again.

use std::sync::Arc;

use bastion_core::contracts::Cache;
use bastion_core::models::{Captcha, CaptchaId, CaptchaKind, CAPTCHA_MAX_ATTEMPTS, CAPTCHA_TTL_SECS};
use bastion_core::CoreError;

use super::infrastructure::cache::{cache_del, cache_get_json, cache_set_json};

fn captcha_key(id: &CaptchaId) -> String {
  format!("captcha:{}", id)
}

fn attempts_key(id: &CaptchaId) -> String {
  format!("captcha:attempts:{}", id)
}

pub struct CaptchaStore {
  cache: Arc<dyn Cache>,
}

impl CaptchaStore {
  pub fn new(cache: Arc<dyn Cache>) -> Self {
    Self { cache }
  }

  /// Store a fresh challenge under a generated id
  pub async fn set(&self, answer: &str, kind: CaptchaKind) -> Result<Captcha, CoreError> {
    let captcha = Captcha {
      id: CaptchaId::generate(),
      answer: answer.to_string(),
      kind,
    };

    let bytes = serde_json::to_vec(&captcha)?;
    self
      .cache
      .set_bytes(&captcha_key(&captcha.id), bytes, CAPTCHA_TTL_SECS)
      .await?;

    Ok(captcha)
  }

  pub async fn get(&self, id: &CaptchaId) -> Result<Option<Captcha>, CoreError> {
    match self.cache.get_bytes(&captcha_key(id)).await? {
      Some(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
      None => Ok(None),
    }
  }

  async fn burn(&self, id: &CaptchaId) {
    cache_del(self.cache.as_ref(), &captcha_key(id)).await;
    cache_del(self.cache.as_ref(), &attempts_key(id)).await;
  }

  /// Check an answer. Every call counts as an attempt; crossing the attempt
  /// budget or answering correctly both remove the challenge.
  pub async fn verify(&self, id: &CaptchaId, answer: &str) -> Result<(), CoreError> {
    let attempts = self
      .cache
      .incr(&attempts_key(id), CAPTCHA_TTL_SECS)
      .await?;
    if attempts > CAPTCHA_MAX_ATTEMPTS {
      self.burn(id).await;
      return Err(CoreError::MaxAttemptsExceeded(
        "captcha attempts exhausted".to_string(),
      ));
    }

    let captcha = self
      .get(id)
      .await?
      .ok_or_else(|| CoreError::NotFound("captcha not found".to_string()))?;

    if captcha.answer.eq_ignore_ascii_case(answer.trim()) {
      self.burn(id).await;
      return Ok(());
    }

    if attempts >= CAPTCHA_MAX_ATTEMPTS {
      self.burn(id).await;
      return Err(CoreError::MaxAttemptsExceeded(
        "captcha attempts exhausted".to_string(),
      ));
    }

    Err(CoreError::InvalidRequest("wrong captcha answer".to_string()))
  }

  pub async fn delete(&self, id: &CaptchaId) -> Result<(), CoreError> {
    self.burn(id).await;
    Ok(())
  }
}
