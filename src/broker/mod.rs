//! Broker session management.
//!
//! Owns the connection to the message broker: connect, authenticate,
//! subscribe to the fixed topic set, and reconnect with jittered exponential
//! backoff on transport loss. Received messages are stamped with local
//! receipt time and handed to the sink pipeline through a bounded queue.
//!
//! The broker library sits behind the [`BrokerConnector`]/[`BrokerSession`]
//! seam so integration tests can script transport faults without a live
//! broker.

mod backoff;
mod mqtt;
mod session;
mod transport;

pub use backoff::BackoffPolicy;
pub use mqtt::MqttConnector;
pub use session::SessionManager;
pub use transport::{
    BrokerConnector, BrokerSession, ConnectedSession, SessionEvent, SubscribeGrant,
};

/// Connection lifecycle, owned solely by the session manager.
///
/// Transitions are driven by broker acknowledgements and transport errors:
/// Disconnected → Connecting → Connected → Reconnecting → Connecting → …,
/// with Failed as the terminal state once the attempt ceiling is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// Numeric encoding for the state gauge.
    pub fn as_gauge(&self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Reconnecting => 3,
            Self::Failed => 4,
        }
    }
}
