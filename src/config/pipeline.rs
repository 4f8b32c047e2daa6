//! Queue, worker, and retry bounds for the record pipeline.

use serde::Deserialize;
use std::time::Duration;

/// Bounds for the queue between the receive loop and the sink workers.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Bounded queue capacity between the receive loop and the workers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of sink worker tasks. With 1 worker, records from a topic are
    /// persisted in receipt order; with more than 1, per-topic ordering is
    /// NOT guaranteed across workers. This is a deliberate throughput
    /// tradeoff, not an accident.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How long the receive loop blocks on a full queue before deliberately
    /// dropping the broker connection (forcing redelivery per QoS).
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,
    /// Immediate retries granted to a retryable persist failure before it is
    /// escalated to fatal and the record is reported as lost.
    #[serde(default = "default_persist_max_retries")]
    pub persist_max_retries: u32,
    /// Delay between persist retries, in milliseconds.
    #[serde(default = "default_persist_retry_delay_ms")]
    pub persist_retry_delay_ms: u64,
    /// Grace period for draining the queue on shutdown; records still queued
    /// afterwards are abandoned as fatal and logged for operator recovery.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl PipelineConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            persist_max_retries: default_persist_max_retries(),
            persist_retry_delay_ms: default_persist_retry_delay_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_workers() -> usize {
    1
}

fn default_enqueue_timeout_ms() -> u64 {
    5000
}

fn default_persist_max_retries() -> u32 {
    3
}

fn default_persist_retry_delay_ms() -> u64 {
    100
}

fn default_shutdown_grace_secs() -> u64 {
    5
}
