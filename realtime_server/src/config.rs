use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
  pub server: ServerConfig,
  pub auth: AuthConfig,
  #[serde(default)]
  pub limits: LimitsConfig,
  pub messaging: MessagingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
  pub port: u16,
}

/// The realtime server only verifies tokens, so it carries the public key
/// alone.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
  pub pk: String,
  #[serde(default = "default_issuer")]
  pub issuer: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LimitsConfig {
  /// Outbound frames buffered per client before it is dropped
  #[serde(default = "default_send_queue")]
  pub send_queue_capacity: usize,
  #[serde(default = "default_max_frame")]
  pub max_frame_bytes: usize,
  #[serde(default = "default_ping_secs")]
  pub ping_interval_secs: u64,
  #[serde(default = "default_read_secs")]
  pub read_timeout_secs: u64,
  #[serde(default = "default_write_secs")]
  pub write_timeout_secs: u64,
  /// Clients silent longer than this are evicted by the sweeper
  #[serde(default = "default_stale_secs")]
  pub stale_after_secs: u64,
  #[serde(default = "default_sweep_secs")]
  pub sweep_interval_secs: u64,
}

impl Default for LimitsConfig {
  fn default() -> Self {
    Self {
      send_queue_capacity: default_send_queue(),
      max_frame_bytes: default_max_frame(),
      ping_interval_secs: default_ping_secs(),
      read_timeout_secs: default_read_secs(),
      write_timeout_secs: default_write_secs(),
      stale_after_secs: default_stale_secs(),
      sweep_interval_secs: default_sweep_secs(),
    }
  }
}

impl LimitsConfig {
  pub fn ping_interval(&self) -> Duration {
    Duration::from_secs(self.ping_interval_secs)
  }

  pub fn read_timeout(&self) -> Duration {
    Duration::from_secs(self.read_timeout_secs)
  }

  pub fn write_timeout(&self) -> Duration {
    Duration::from_secs(self.write_timeout_secs)
  }

  pub fn stale_after(&self) -> Duration {
    Duration::from_secs(self.stale_after_secs)
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs)
  }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessagingConfig {
  pub enabled: bool,
  pub nats_url: String,
  #[serde(default = "default_subject_prefix")]
  pub subject_prefix: String,
}

fn default_issuer() -> String {
  "bastion".to_string()
}
fn default_send_queue() -> usize {
  256
}
fn default_max_frame() -> usize {
  512 * 1024
}
fn default_ping_secs() -> u64 {
  30
}
fn default_read_secs() -> u64 {
  60
}
fn default_write_secs() -> u64 {
  10
}
fn default_stale_secs() -> u64 {
  120
}
fn default_sweep_secs() -> u64 {
  30
}
fn default_subject_prefix() -> String {
  "bastion.events".to_string()
}

impl AppConfig {
  /// Read from ./realtime.yml, /etc/config/realtime.yml, or $REALTIME_CONFIG
  pub fn load() -> Result<Self> {
    let ret: std::result::Result<AppConfig, serde_yaml::Error> = match (
      File::open("realtime.yml"),
      File::open("/etc/config/realtime.yml"),
      env::var("REALTIME_CONFIG"),
    ) {
      (Ok(reader), _, _) => serde_yaml::from_reader(reader),
      (_, Ok(reader), _) => serde_yaml::from_reader(reader),
      (_, _, Ok(path)) => serde_yaml::from_reader(File::open(path)?),
      _ => bail!("config file not found"),
    };

    Ok(ret?)
  }
}
