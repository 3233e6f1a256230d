//! Application state: every store, resolver and collaborator wired once at
//! startup, plus the lifecycle owner for background maintenance tasks.
//! A missing collaborator is a construction error here, never a nil at
//! request time.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bastion_core::contracts::{
  AccessCollaborator, Cache, CaptchaRenderer, EventBus, MailTransport, PolicyEngine,
  SpaceCollaborator, UserCollaborator,
};
use bastion_core::secrets::SecretBox;
use bastion_core::{AccessClaims, CoreError, TokenManager, TokenVerifier};

use crate::config::AppConfig;
use crate::services::auth::AuthService;
use crate::services::auth_tokens::{AuthTokenStore, PgAuthTokenStore};
use crate::services::captcha::CaptchaStore;
use crate::services::code_auth::{CodeAuthStore, PgCodeAuthStore};
use crate::services::collaborators::{
  PgAccessCollaborator, PgSpaceCollaborator, PgUserCollaborator,
};
use crate::services::infrastructure::cache::RedisCacheService;
use crate::services::infrastructure::events::InProcessEventBus;
use crate::services::infrastructure::mail::{NullMailTransport, SmtpMailTransport};
use crate::services::mfa::{MfaService, PgMfaStore};
use crate::services::permissions::PermissionResolver;
use crate::services::policy::PolicyGate;
use crate::services::scopes::ScopeResolver;
use crate::services::sessions::{PgSessionStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
  inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
  pub config: AppConfig,
  pub pool: PgPool,
  pub token_manager: TokenManager,
  pub cache: Option<Arc<dyn Cache>>,
  pub auth_tokens: Arc<dyn AuthTokenStore>,
  pub sessions: Arc<dyn SessionStore>,
  pub code_auths: Arc<dyn CodeAuthStore>,
  pub captcha: Option<Arc<CaptchaStore>>,
  pub mfa: Arc<MfaService>,
  pub users: Arc<dyn UserCollaborator>,
  pub spaces: Arc<dyn SpaceCollaborator>,
  pub access: Arc<dyn AccessCollaborator>,
  pub scope_resolver: Arc<ScopeResolver>,
  pub permission_resolver: Arc<PermissionResolver>,
  pub policy_gate: Arc<PolicyGate>,
  pub events: Arc<dyn EventBus>,
  pub mail: Arc<dyn MailTransport>,
  pub auth: Arc<AuthService>,
  pub captcha_renderer: Option<Arc<dyn CaptchaRenderer>>,
  shutdown: CancellationToken,
}

/// Externally-provided collaborators injected at wiring time
#[derive(Default)]
pub struct Wiring {
  pub policy_engine: Option<Arc<dyn PolicyEngine>>,
  pub captcha_renderer: Option<Arc<dyn CaptchaRenderer>>,
}

impl Deref for AppState {
  type Target = AppStateInner;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl TokenVerifier for AppState {
  type Claims = AccessClaims;
  type Error = CoreError;

  fn verify_token(&self, token: &str) -> Result<Self::Claims, Self::Error> {
    self.inner.token_manager.verify_access_token(token)
  }
}

impl AppState {
  /// Wire everything. Optional subsystems (cache, mail, messaging) degrade
  /// according to configuration; required collaborators fail construction.
  pub async fn try_new(config: AppConfig) -> Result<Self, CoreError> {
    Self::try_new_with(config, Wiring::default()).await
  }

  pub async fn try_new_with(config: AppConfig, wiring: Wiring) -> Result<Self, CoreError> {
    let pool = PgPoolOptions::new()
      .max_connections(16)
      .acquire_timeout(Duration::from_millis(config.server.request_timeout_ms))
      .connect(&config.server.db_url)
      .await?;

    crate::migrations::run(&pool).await?;

    let token_manager = TokenManager::from_config(&config.auth)?;

    let cache: Option<Arc<dyn Cache>> = if config.features.cache.enabled {
      match RedisCacheService::new(
        &config.features.cache.redis_url,
        &config.features.cache.key_prefix,
      )
      .await
      {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
          warn!("cache disabled, redis unavailable: {}", e);
          None
        }
      }
    } else {
      None
    };

    let auth_tokens: Arc<dyn AuthTokenStore> = Arc::new(PgAuthTokenStore::new(pool.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(
      pool.clone(),
      cache.clone(),
      config.features.sessions.ttl_secs,
      config.features.sessions.touch_interval_secs,
      config.features.sessions.max_list_limit,
    ));
    let code_auths: Arc<dyn CodeAuthStore> = Arc::new(PgCodeAuthStore::new(pool.clone()));

    // Captcha is cache-only; without a cache the feature is off
    let captcha = match (&cache, config.features.captcha.enabled) {
      (Some(cache), true) => Some(Arc::new(CaptchaStore::new(cache.clone()))),
      (None, true) => {
        warn!("captcha requested but cache is unavailable; feature disabled");
        None
      }
      _ => None,
    };

    let secrets = SecretBox::from_base64_key(&config.auth.mfa_secret_key)?;
    let mfa = Arc::new(MfaService::new(
      Arc::new(PgMfaStore::new(pool.clone())),
      secrets,
      "bastion",
    ));

    let users: Arc<dyn UserCollaborator> = Arc::new(PgUserCollaborator::new(pool.clone()));
    let spaces: Arc<dyn SpaceCollaborator> = Arc::new(PgSpaceCollaborator::new(pool.clone()));
    let access: Arc<dyn AccessCollaborator> = Arc::new(PgAccessCollaborator::new(pool.clone()));

    let scope_resolver = Arc::new(ScopeResolver::new(spaces.clone(), cache.clone()));
    let permission_resolver = Arc::new(PermissionResolver::new(access.clone()));

    let events: Arc<dyn EventBus> = if config.features.messaging.enabled {
      Arc::new(
        InProcessEventBus::with_nats(
          &config.features.messaging.nats_url,
          &config.features.messaging.subject_prefix,
        )
        .await?,
      )
    } else {
      Arc::new(InProcessEventBus::new())
    };

    let mail: Arc<dyn MailTransport> = if config.features.mail.enabled {
      Arc::new(SmtpMailTransport::new(&config.features.mail)?)
    } else {
      Arc::new(NullMailTransport)
    };

    if config.features.captcha.enabled && wiring.captcha_renderer.is_none() {
      return Err(CoreError::Internal(
        "captcha is enabled but no renderer was wired".to_string(),
      ));
    }

    let policy_gate = Arc::new(PolicyGate::new(wiring.policy_engine, events.clone()));

    let auth = Arc::new(AuthService::new(
      users.clone(),
      spaces.clone(),
      access.clone(),
      auth_tokens.clone(),
      sessions.clone(),
      code_auths.clone(),
      captcha.clone(),
      mfa.clone(),
      scope_resolver.clone(),
      permission_resolver.clone(),
      token_manager.clone(),
      mail.clone(),
      events.clone(),
      config.auth.frontend.clone(),
    ));

    let state = Self {
      inner: Arc::new(AppStateInner {
        config,
        pool,
        token_manager,
        cache,
        auth_tokens,
        sessions,
        code_auths,
        captcha,
        mfa,
        users,
        spaces,
        access,
        scope_resolver,
        permission_resolver,
        policy_gate,
        events,
        mail,
        auth,
        captcha_renderer: wiring.captcha_renderer,
        shutdown: CancellationToken::new(),
      }),
    };

    state.spawn_maintenance();
    Ok(state)
  }

  /// Background maintenance owned by this state's lifecycle: the expired
  /// session sweeper. Tasks observe the shutdown token and exit cooperatively.
  fn spawn_maintenance(&self) {
    let sessions = self.inner.sessions.clone();
    let token = self.inner.shutdown.clone();
    let interval = Duration::from_secs(self.inner.config.features.sessions.cleanup_interval_secs);

    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = token.cancelled() => {
            info!("session cleanup task stopping");
            break;
          }
          _ = ticker.tick() => {
            match sessions.cleanup_expired().await {
              Ok(0) => {}
              Ok(n) => info!("session cleanup removed {} expired sessions", n),
              Err(e) => warn!("session cleanup failed: {}", e),
            }
          }
        }
      }
    });
  }

  pub fn shutdown(&self) {
    self.inner.shutdown.cancel();
  }
}
