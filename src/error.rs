//! Unified error handling for mqttsinkd.
//!
//! Transport-level errors are recovered locally by the session manager
//! (reconnect with backoff) and never surfaced per-message; persist errors
//! are recovered up to the retry bound and then reported as lost records.
//! Only [`BridgeError`] reaches the operator as a process failure.

use thiserror::Error;

/// Errors establishing a broker session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The broker rejected our credentials.
    #[error("broker rejected credentials: {0}")]
    Auth(String),

    /// The endpoint was unreachable or the transport failed mid-handshake.
    #[error("broker unreachable: {0}")]
    Network(String),

    /// Handshake mismatch (protocol version, malformed CONNACK).
    #[error("protocol handshake failed: {0}")]
    Protocol(String),
}

impl ConnectError {
    /// Static error code for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Network(_) => "network",
            Self::Protocol(_) => "protocol",
        }
    }
}

/// Errors registering the topic subscriptions.
///
/// Per-topic rejections are not an error at this level; they are reported in
/// each [`SubscribeGrant`](crate::broker::SubscribeGrant). This type covers
/// failures of the subscribe exchange itself.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// The transport dropped before the broker acknowledged the subscription.
    #[error("transport lost while subscribing: {0}")]
    Transport(String),
}

/// Transport loss on an established session.
#[derive(Debug, Error)]
#[error("broker transport error: {0}")]
pub struct TransportError(pub String);

/// Terminal failures surfaced to the operator as a non-zero exit.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The reconnect attempt ceiling was exhausted.
    #[error("gave up connecting to broker after {attempts} attempts: {last_error}")]
    ConnectionFailed { attempts: u32, last_error: String },
}
