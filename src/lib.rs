//! mqttsinkd - a durable MQTT to PostgreSQL telemetry bridge.
//!
//! Holds a persistent subscription over a fixed topic set and records every
//! message in a relational store with a locally assigned receipt timestamp.
//! Two components compose the pipeline: the broker session manager
//! ([`broker`]) feeding a bounded queue, and the durable sink ([`sink`])
//! consuming it. The binary in `main.rs` is a thin wrapper so tests and
//! embedders can drive [`bridge::run`] directly.

pub mod bridge;
pub mod broker;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod sink;
