//! Trait seam between the session manager and the broker library.
//!
//! The production implementation is [`MqttConnector`](super::MqttConnector);
//! integration tests substitute scripted implementations to inject transport
//! faults, subscription rejections, and publish sequences.

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::BrokerConfig;
use crate::error::{ConnectError, SubscribeError, TransportError};
use crate::record::{QosLevel, TopicSet};

/// Something happening on an established session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// An application message arrived on a subscribed topic.
    Publish { topic: String, payload: Bytes },
}

/// Per-topic subscription acknowledgement.
///
/// Partial subscription failure is reported per topic, never collapsed into
/// a single boolean.
#[derive(Debug, Clone)]
pub struct SubscribeGrant {
    pub filter: String,
    /// The granted QoS, or `None` if the broker rejected this filter.
    pub granted: Option<QosLevel>,
}

/// A successfully established session plus the broker's session-resume flag.
pub struct ConnectedSession {
    pub session: Box<dyn BrokerSession>,
    /// True when the broker resumed a persistent session; subscriptions from
    /// the previous session are still registered broker-side.
    pub session_present: bool,
}

/// Establishes broker sessions.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, config: &BrokerConfig) -> Result<ConnectedSession, ConnectError>;
}

/// An established broker session.
///
/// Owned exclusively by the session manager; dropped (and replaced by a
/// fresh connect) after any transport error.
#[async_trait]
pub trait BrokerSession: Send {
    /// Register interest in every filter of the set. Rejections are reported
    /// per topic in the returned grants.
    async fn subscribe(
        &mut self,
        topics: &TopicSet,
        qos: QosLevel,
    ) -> Result<Vec<SubscribeGrant>, SubscribeError>;

    /// Wait for the next session event. Transport loss surfaces here.
    async fn next_event(&mut self) -> Result<SessionEvent, TransportError>;

    /// Acknowledge the most recently delivered publish.
    ///
    /// Called only after the record has been handed to the sink queue, so a
    /// deliberately dropped connection leaves the unacknowledged message
    /// eligible for broker redelivery at QoS 1. No-op at QoS 0.
    async fn ack(&mut self);

    /// Best-effort clean disconnect.
    async fn disconnect(&mut self);
}
