use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::CaptchaKind;

/// Outbound templated mail. Template variables arrive as a JSON object.
#[async_trait]
pub trait MailTransport: Send + Sync {
  async fn send_templated(
    &self,
    to: &str,
    template: &str,
    variables: serde_json::Value,
  ) -> Result<(), CoreError>;
}

/// Mail template names the core sends with
pub mod mail_templates {
  pub const LOGIN_CODE: &str = "login_code";
  pub const REGISTER_CODE: &str = "register_code";
}

/// Renders captcha challenges into media. The rendering itself lives outside
/// the core; the store only keeps the answer and attempt counter.
pub trait CaptchaRenderer: Send + Sync {
  fn render(&self, kind: CaptchaKind, answer: &str) -> Result<Vec<u8>, CoreError>;
}

/// Cache abstraction over redis (or an in-memory stand-in for tests).
/// Values are JSON bytes; failures are surfaced so callers can decide to
/// swallow them (caches are projections, never authoritative).
#[async_trait]
pub trait Cache: Send + Sync {
  async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

  async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), CoreError>;

  async fn del(&self, key: &str) -> Result<bool, CoreError>;

  /// Increment and return the new value, applying `ttl_secs` on first write
  async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, CoreError>;
}
