//! Integration test common infrastructure.
//!
//! Provides a scripted broker connector for injecting publishes and
//! transport faults, and in-memory sinks for observing persisted records.

pub mod broker;
pub mod sink;

#[allow(unused_imports)]
pub use broker::{ScriptStep, ScriptedBroker, SessionScript};
#[allow(unused_imports)]
pub use sink::{MemorySink, StallSink};

use std::time::Duration;

use mqttsinkd::config::{BrokerConfig, Config, PipelineConfig, ReconnectConfig, StoreConfig};

/// A config pointed at nothing real: the scripted connector ignores the
/// broker section and no test reaches the store section.
pub fn test_config() -> Config {
    Config {
        broker: BrokerConfig {
            host: "broker.test".into(),
            port: 1883,
            client_id: "mqttsinkd-test".into(),
            username: None,
            password: None,
            topics: vec!["sensor/temperature".into(), "sensor/humidity".into()],
            qos: 1,
            keep_alive_secs: 30,
            persistent_session: false,
        },
        store: StoreConfig {
            host: "db.test".into(),
            port: 5432,
            dbname: "telemetry".into(),
            user: "bridge".into(),
            password: "unused".into(),
            table: "mqtt_data".into(),
            pool_size: 2,
        },
        pipeline: PipelineConfig::default(),
        reconnect: ReconnectConfig {
            initial_delay_ms: 10,
            max_delay_secs: 1,
            max_attempts: 5,
        },
        metrics_port: 0,
    }
}

/// Poll `cond` every 10ms until it holds or `deadline` elapses.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(deadline: Duration, cond: F) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
