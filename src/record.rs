//! Core data model shared between the broker session and the sink.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error returned when a [`TopicSet`] would be empty.
#[derive(Debug, Error)]
#[error("topic set must contain at least one filter")]
pub struct EmptyTopicSet;

/// The ordered set of topic filters the bridge subscribes to.
///
/// Fixed at startup. Duplicate filters are permitted (the broker treats them
/// as redundant), but the set must never be empty.
#[derive(Debug, Clone)]
pub struct TopicSet {
    filters: Vec<String>,
}

impl TopicSet {
    /// Build a topic set, rejecting an empty filter list.
    pub fn new(filters: Vec<String>) -> Result<Self, EmptyTopicSet> {
        if filters.is_empty() {
            return Err(EmptyTopicSet);
        }
        Ok(Self { filters })
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Delivery guarantee requested from the broker.
///
/// The bridge's own end-to-end guarantee can be no stronger than this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    /// Fire-and-forget; the broker never redelivers.
    AtMostOnce,
    /// The broker redelivers until acknowledged. Redelivery after a dropped
    /// session may produce duplicate rows in the store.
    AtLeastOnce,
}

impl QosLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtMostOnce => "at_most_once",
            Self::AtLeastOnce => "at_least_once",
        }
    }
}

/// A single message as delivered by the broker.
///
/// Created the instant the broker client hands us the publish, immutable
/// thereafter, and consumed exactly once by the sink. `received_at` is local
/// receipt time; MQTT 3.1.1 carries no broker-side timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRecord {
    pub topic: String,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

impl InboundRecord {
    /// Stamp a freshly delivered message with the current wall clock.
    pub fn now(topic: String, payload: Bytes) -> Self {
        Self {
            topic,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// How a single persist attempt resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistResult {
    /// The row is committed.
    Success,
    /// A transient condition (connection refused, pool timeout,
    /// serialization conflict). Worth retrying.
    Retryable(String),
    /// A condition that will not resolve on retry (schema mismatch, auth
    /// rejection, payload exceeding a column limit). The record is lost.
    Fatal(String),
}

impl PersistResult {
    /// Static label for metrics.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Retryable(_) => "retryable",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// The outcome of persisting one record.
///
/// Every call to a sink's `persist` yields exactly one of these; the record
/// travels with it so a fatal outcome can be logged with full content for
/// manual replay.
#[derive(Debug)]
pub struct PersistOutcome {
    pub record: InboundRecord,
    pub result: PersistResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_set_rejects_empty() {
        assert!(TopicSet::new(vec![]).is_err());
    }

    #[test]
    fn topic_set_keeps_order_and_duplicates() {
        let set = TopicSet::new(vec![
            "sensor/temperature".into(),
            "sensor/humidity".into(),
            "sensor/temperature".into(),
        ])
        .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.filters()[0], "sensor/temperature");
        assert_eq!(set.filters()[2], "sensor/temperature");
    }

    #[test]
    fn record_timestamp_is_recent() {
        let before = Utc::now();
        let record = InboundRecord::now("t".into(), Bytes::from_static(b"23.5"));
        let after = Utc::now();
        assert!(record.received_at >= before && record.received_at <= after);
    }
}
