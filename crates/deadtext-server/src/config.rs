//! Runtime configuration, deserialised from `config.toml` and `DEADTEXT_*`
//! environment variables.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context as _, bail};
use chrono::TimeDelta;
use deadtext_core::notify::DEFAULT_TEMPLATE;
use deadtext_engine::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  pub auth_username:          String,
  pub auth_password_hash:     String,
  #[serde(default = "default_cycle_interval")]
  pub cycle_interval_secs:    u64,
  #[serde(default = "default_grace_period")]
  pub grace_period_secs:      u64,
  #[serde(default = "default_notify_timeout")]
  pub notify_timeout_secs:    u64,
  #[serde(default)]
  pub renotify_interval_secs: Option<u64>,
  #[serde(default = "default_page_size")]
  pub page_size:              usize,
  #[serde(default)]
  pub webhook_url:            Option<String>,
  #[serde(default = "default_template")]
  pub message_template:       String,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("deadtext.db") }
fn default_cycle_interval() -> u64 { 30 }
fn default_grace_period() -> u64 { 300 }
fn default_notify_timeout() -> u64 { 10 }
fn default_page_size() -> usize { 100 }
fn default_template() -> String { DEFAULT_TEMPLATE.to_string() }

impl ServerConfig {
  /// Layer the optional TOML file under `DEADTEXT_*` environment variables.
  pub fn load(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    let settings = builder
      .add_source(config::Environment::with_prefix("DEADTEXT"))
      .build()
      .context("failed to read configuration")?;
    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    if self.cycle_interval_secs == 0 {
      bail!("cycle_interval_secs must be positive");
    }
    if self.notify_timeout_secs == 0 {
      bail!("notify_timeout_secs must be positive");
    }
    if self.page_size == 0 {
      bail!("page_size must be positive");
    }
    if self.renotify_interval_secs == Some(0) {
      bail!("renotify_interval_secs must be positive when set");
    }
    if self.message_template.trim().is_empty() {
      bail!("message_template must not be blank");
    }
    Ok(())
  }

  pub fn cycle_interval(&self) -> Duration {
    Duration::from_secs(self.cycle_interval_secs)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `store_path` with a leading `~/` replaced by `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    let home = std::env::var_os("HOME");
    match (self.store_path.strip_prefix("~"), home) {
      (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
      _ => self.store_path.clone(),
    }
  }

  pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
    let renotify_interval = match self.renotify_interval_secs {
      Some(secs) => Some(seconds(secs, "renotify_interval_secs")?),
      None => None,
    };
    Ok(EngineConfig {
      grace_period: seconds(self.grace_period_secs, "grace_period_secs")?,
      notify_timeout: Duration::from_secs(self.notify_timeout_secs),
      renotify_interval,
      page_size: self.page_size,
      message_template: self.message_template.clone(),
    })
  }
}

fn seconds(secs: u64, field: &str) -> anyhow::Result<TimeDelta> {
  i64::try_from(secs)
    .ok()
    .and_then(TimeDelta::try_seconds)
    .with_context(|| format!("{field} is out of range"))
}
