use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use bastion_core::{AccessClaims, AccessTokenVerifier, CoreError, TokenVerifier};

use crate::config::AppConfig;
use crate::error::RealtimeError;
use crate::hub::Hub;

#[derive(Clone)]
pub struct AppState {
  inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
  pub config: AppConfig,
  pub hub: Arc<Hub>,
  verifier: AccessTokenVerifier,
  shutdown: CancellationToken,
}

impl Deref for AppState {
  type Target = AppStateInner;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl TokenVerifier for AppState {
  type Claims = AccessClaims;
  type Error = RealtimeError;

  fn verify_token(&self, token: &str) -> Result<Self::Claims, Self::Error> {
    use bastion_core::ErrorMapper;

    self
      .inner
      .verifier
      .verify_access_token(token)
      .map_err(RealtimeError::map_error)
  }
}

impl AppState {
  pub fn try_new(config: AppConfig) -> Result<Self, CoreError> {
    let verifier = AccessTokenVerifier::new(&config.auth.pk, &config.auth.issuer, 30)?;
    let shutdown = CancellationToken::new();
    let hub = Hub::start(&config.limits, shutdown.clone());

    Ok(Self {
      inner: Arc::new(AppStateInner {
        config,
        hub,
        verifier,
        shutdown,
      }),
    })
  }

  pub fn shutdown_token(&self) -> CancellationToken {
    self.inner.shutdown.clone()
  }

  pub fn shutdown(&self) {
    self.inner.shutdown.cancel();
  }
}
