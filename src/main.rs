//! mqttsinkd - durable MQTT to PostgreSQL telemetry bridge.
//!
//! Thin binary wrapper; the wiring lives in [`mqttsinkd::bridge`] so tests
//! and integration points can drive it directly.

use mqttsinkd::config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        broker = %config.broker.host,
        port = config.broker.port,
        topics = config.broker.topics.len(),
        store = %config.store.dbname,
        "Starting mqttsinkd"
    );

    mqttsinkd::bridge::run(config).await
}
