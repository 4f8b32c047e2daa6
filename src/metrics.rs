//! Prometheus metrics collection for mqttsinkd.
//!
//! Tracks bridge throughput (records received/persisted/lost), broker
//! session health (connects, reconnects, rejected filters), and sink
//! behavior (retries, persist latency, queue depth). Exposed on an HTTP
//! endpoint for scraping; see [`crate::http`].

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::sync::OnceLock;

use crate::broker::ConnectionState;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Messages delivered by the broker.
pub static RECORDS_RECEIVED: OnceLock<IntCounter> = OnceLock::new();

/// Records committed to the store.
pub static RECORDS_PERSISTED: OnceLock<IntCounter> = OnceLock::new();

/// Persist retries after a retryable failure.
pub static RECORDS_RETRIED: OnceLock<IntCounter> = OnceLock::new();

/// Records lost (retries exhausted, fatal failure, or abandoned at shutdown).
pub static RECORDS_LOST: OnceLock<IntCounter> = OnceLock::new();

/// Successful session establishments (connect + subscribe).
pub static BROKER_CONNECTS: OnceLock<IntCounter> = OnceLock::new();

/// Reconnects triggered by transport loss or a stalled sink queue.
pub static BROKER_RECONNECTS: OnceLock<IntCounter> = OnceLock::new();

/// Topic filters rejected by the broker at subscribe time.
pub static SUBSCRIBE_REJECTED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Connection state (0 disconnected, 1 connecting, 2 connected,
/// 3 reconnecting, 4 failed).
pub static CONNECTION_STATE: OnceLock<IntGauge> = OnceLock::new();

/// Records currently queued between the receive loop and the workers.
pub static QUEUE_DEPTH: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Store round-trip latency per record (including retries).
pub static PERSIST_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded. Helpers
/// below degrade to no-ops when the registry was never initialized (as in
/// most tests).
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        RECORDS_RECEIVED,
        IntCounter::new("bridge_records_received_total", "Messages delivered by the broker")
    );
    register!(
        RECORDS_PERSISTED,
        IntCounter::new("bridge_records_persisted_total", "Records committed to the store")
    );
    register!(
        RECORDS_RETRIED,
        IntCounter::new("bridge_records_retried_total", "Persist retries")
    );
    register!(
        RECORDS_LOST,
        IntCounter::new("bridge_records_lost_total", "Records lost after retries or shutdown")
    );
    register!(
        BROKER_CONNECTS,
        IntCounter::new("bridge_broker_connects_total", "Successful session establishments")
    );
    register!(
        BROKER_RECONNECTS,
        IntCounter::new("bridge_broker_reconnects_total", "Reconnects after transport loss or queue stall")
    );
    register!(
        SUBSCRIBE_REJECTED,
        IntCounter::new("bridge_subscribe_rejected_total", "Topic filters rejected by the broker")
    );
    register!(
        CONNECTION_STATE,
        IntGauge::new("bridge_connection_state", "Broker connection state")
    );
    register!(
        QUEUE_DEPTH,
        IntGauge::new("bridge_queue_depth", "Records queued for the sink workers")
    );
    register!(
        PERSIST_LATENCY,
        Histogram::with_opts(
            HistogramOpts::new("bridge_persist_duration_seconds", "Store round-trip per record")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
        )
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for bridge metric updates
// ============================================================================

#[inline]
fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

#[inline]
pub fn inc_records_received() {
    inc(&RECORDS_RECEIVED);
}

#[inline]
pub fn inc_records_persisted() {
    inc(&RECORDS_PERSISTED);
}

#[inline]
pub fn inc_records_retried() {
    inc(&RECORDS_RETRIED);
}

#[inline]
pub fn inc_records_lost() {
    inc(&RECORDS_LOST);
}

#[inline]
pub fn inc_connections() {
    inc(&BROKER_CONNECTS);
}

#[inline]
pub fn inc_reconnects() {
    inc(&BROKER_RECONNECTS);
}

#[inline]
pub fn inc_subscribe_rejected() {
    inc(&SUBSCRIBE_REJECTED);
}

#[inline]
pub fn set_connection_state(state: ConnectionState) {
    if let Some(g) = CONNECTION_STATE.get() {
        g.set(state.as_gauge());
    }
}

#[inline]
pub fn set_queue_depth(depth: i64) {
    if let Some(g) = QUEUE_DEPTH.get() {
        g.set(depth);
    }
}

#[inline]
pub fn observe_persist_seconds(seconds: f64) {
    if let Some(h) = PERSIST_LATENCY.get() {
        h.observe(seconds);
    }
}
