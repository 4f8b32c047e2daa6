//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level `Config` struct, loading, and validation
//! - [`broker`]: Broker endpoint, credentials, topics, QoS, reconnect policy
//! - [`store`]: PostgreSQL connection parameters
//! - [`pipeline`]: Queue capacity, worker count, retry and shutdown bounds
//!
//! Core components receive plain structured values from here; nothing else
//! in the crate reaches into the environment or the config file directly.

mod broker;
mod pipeline;
mod store;
mod types;

pub use broker::{BrokerConfig, ReconnectConfig};
pub use pipeline::PipelineConfig;
pub use store::StoreConfig;
pub use types::{Config, ConfigError};
