//! PostgreSQL store configuration.

use serde::Deserialize;

/// Connection parameters for the relational store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Database hostname or IP.
    pub host: String,
    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Database role.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Target table. Must be a plain SQL identifier; validated at load.
    #[serde(default = "default_table")]
    pub table: String,
    /// Maximum pooled connections shared across sink workers.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_port() -> u16 {
    5432
}

fn default_table() -> String {
    "mqtt_data".to_string()
}

fn default_pool_size() -> u32 {
    5
}
