//! Top-level configuration type, loading, and validation.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::broker::{BrokerConfig, ReconnectConfig};
use super::pipeline::PipelineConfig;
use super::store::StoreConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Broker endpoint, credentials, and subscription set.
    pub broker: BrokerConfig,
    /// PostgreSQL connection parameters.
    pub store: StoreConfig,
    /// Queue, worker, and retry bounds.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Prometheus metrics HTTP port. 0 disables the endpoint (used by tests).
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.topics.is_empty() {
            return Err(ConfigError::Invalid(
                "broker.topics must list at least one topic filter".into(),
            ));
        }
        if !matches!(self.broker.qos, 0 | 1) {
            return Err(ConfigError::Invalid(format!(
                "broker.qos must be 0 (at-most-once) or 1 (at-least-once), got {}",
                self.broker.qos
            )));
        }
        if !is_safe_identifier(&self.store.table) {
            return Err(ConfigError::Invalid(format!(
                "store.table {:?} is not a plain SQL identifier",
                self.store.table
            )));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.queue_capacity must be at least 1".into(),
            ));
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.workers must be at least 1".into(),
            ));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// The store table name is interpolated into SQL, so it must be a plain
/// identifier rather than an arbitrary string.
fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
