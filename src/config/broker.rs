//! Broker connection and subscription configuration.

use serde::Deserialize;

use crate::record::QosLevel;

/// Broker endpoint, credentials, and the fixed subscription set.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or IP.
    pub host: String,
    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client identifier presented at connect time.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Username for broker authentication (optional).
    #[serde(default)]
    pub username: Option<String>,
    /// Password for broker authentication (optional).
    #[serde(default)]
    pub password: Option<String>,
    /// Topic filters to subscribe to. Must be non-empty.
    pub topics: Vec<String>,
    /// Requested QoS: 0 = at-most-once, 1 = at-least-once. The bridge's own
    /// delivery guarantee can be no stronger than this.
    #[serde(default = "default_qos")]
    pub qos: u8,
    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Ask the broker to retain the session across disconnects
    /// (clean_session = false). When the broker resumes such a session,
    /// re-subscription is skipped; messages missed while the session was
    /// closed are NOT recovered beyond the broker's own QoS behavior.
    #[serde(default)]
    pub persistent_session: bool,
}

impl BrokerConfig {
    /// The validated QoS as a typed level.
    pub fn qos_level(&self) -> QosLevel {
        match self.qos {
            0 => QosLevel::AtMostOnce,
            _ => QosLevel::AtLeastOnce,
        }
    }
}

/// Reconnect backoff policy.
///
/// Exponential with uniform jitter, bounded by `max_delay_secs`. After
/// `max_attempts` consecutive failed connection attempts the bridge gives up
/// and exits non-zero.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the backoff interval, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Consecutive failed attempts tolerated before entering the terminal
    /// Failed state.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "mqttsinkd".to_string()
}

fn default_qos() -> u8 {
    1
}

fn default_keep_alive() -> u64 {
    30
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    10
}
