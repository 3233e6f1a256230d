//! Application configuration, loaded once at startup from YAML.

use anyhow::{bail, Result};
use bastion_core::jwt::{
  TokenConfigProvider, ACCESS_TOKEN_EXPIRATION, MFA_TOKEN_EXPIRATION, REFRESH_TOKEN_EXPIRATION,
  REGISTER_TOKEN_EXPIRATION,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
  pub server: ServerConfig,
  pub auth: AuthConfig,
  pub features: FeatureConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
  pub port: u16,
  pub db_url: String,
  /// Base URL this deployment is reachable at; used in captcha media links
  pub base_url: String,
  pub request_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
  /// Ed25519 public key, PEM
  pub pk: String,
  /// Ed25519 private key, PEM
  pub sk: String,
  #[serde(default = "default_access_ttl")]
  pub access_token_ttl: i64,
  #[serde(default = "default_refresh_ttl")]
  pub refresh_token_ttl: i64,
  #[serde(default = "default_register_ttl")]
  pub register_token_ttl: i64,
  #[serde(default = "default_mfa_ttl")]
  pub mfa_token_ttl: i64,
  /// Access tokens older than this many seconds are re-issued in flight
  #[serde(default = "default_stale_after")]
  pub stale_after_secs: i64,
  /// Base64-encoded 32-byte key sealing stored TOTP secrets
  pub mfa_secret_key: String,
  pub frontend: FrontendConfig,
}

/// Frontend URLs embedded into login/register mails
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FrontendConfig {
  pub sign_in_url: String,
  pub sign_up_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeatureConfig {
  pub cache: CacheConfig,
  pub sessions: SessionConfig,
  pub captcha: CaptchaConfig,
  pub mail: MailConfig,
  pub messaging: MessagingConfig,
  /// Paths admitted without authentication: exact, `METHOD:path`, or glob
  #[serde(default)]
  pub whitelist: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
  pub enabled: bool,
  pub redis_url: String,
  pub key_prefix: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
  /// Session lifetime in seconds
  #[serde(default = "default_session_ttl")]
  pub ttl_secs: i64,
  /// Debounce window for coalesced last-access writes
  #[serde(default = "default_touch_interval")]
  pub touch_interval_secs: i64,
  /// Hard cap applied to list page sizes
  #[serde(default = "default_list_limit")]
  pub max_list_limit: i64,
  /// Cleanup ticker cadence
  #[serde(default = "default_cleanup_interval")]
  pub cleanup_interval_secs: u64,
  /// Soft ceiling of concurrent active sessions per user; exceeding it only warns
  pub warn_session_limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptchaConfig {
  pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MailConfig {
  pub enabled: bool,
  pub smtp_host: String,
  pub smtp_port: u16,
  pub smtp_username: Option<String>,
  pub smtp_password: Option<String>,
  pub from: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessagingConfig {
  pub enabled: bool,
  pub nats_url: String,
  #[serde(default = "default_subject_prefix")]
  pub subject_prefix: String,
}

fn default_access_ttl() -> i64 {
  ACCESS_TOKEN_EXPIRATION
}
fn default_refresh_ttl() -> i64 {
  REFRESH_TOKEN_EXPIRATION
}
fn default_register_ttl() -> i64 {
  REGISTER_TOKEN_EXPIRATION
}
fn default_mfa_ttl() -> i64 {
  MFA_TOKEN_EXPIRATION
}
fn default_stale_after() -> i64 {
  3600
}
fn default_session_ttl() -> i64 {
  7 * 24 * 60 * 60
}
fn default_touch_interval() -> i64 {
  300
}
fn default_list_limit() -> i64 {
  100
}
fn default_cleanup_interval() -> u64 {
  3600
}
fn default_subject_prefix() -> String {
  "bastion.events".to_string()
}

impl AppConfig {
  /// Read from ./bastion.yml, /etc/config/bastion.yml, or $BASTION_CONFIG
  pub fn load() -> Result<Self> {
    let ret: std::result::Result<AppConfig, serde_yaml::Error> = match (
      File::open("bastion.yml"),
      File::open("/etc/config/bastion.yml"),
      env::var("BASTION_CONFIG"),
    ) {
      (Ok(reader), _, _) => serde_yaml::from_reader(reader),
      (_, Ok(reader), _) => serde_yaml::from_reader(reader),
      (_, _, Ok(path)) => serde_yaml::from_reader(File::open(path)?),
      _ => bail!("config file not found"),
    };

    Ok(ret?)
  }
}

impl TokenConfigProvider for AuthConfig {
  fn get_encoding_key_pem(&self) -> &str {
    &self.sk
  }

  fn get_decoding_key_pem(&self) -> &str {
    &self.pk
  }

  fn access_token_ttl(&self) -> i64 {
    self.access_token_ttl
  }

  fn refresh_token_ttl(&self) -> i64 {
    self.refresh_token_ttl
  }

  fn register_token_ttl(&self) -> i64 {
    self.register_token_ttl
  }

  fn mfa_token_ttl(&self) -> i64 {
    self.mfa_token_ttl
  }
}
