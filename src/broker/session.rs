//! The broker session manager: state machine, reconnect loop, receive loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::transport::{BrokerConnector, BrokerSession, ConnectedSession, SessionEvent};
use super::ConnectionState;
use crate::config::{BrokerConfig, PipelineConfig, ReconnectConfig};
use crate::error::BridgeError;
use crate::lifecycle::Shutdown;
use crate::metrics;
use crate::record::{InboundRecord, QosLevel, TopicSet};

/// Why the receive loop stopped pumping an established session.
enum PumpExit {
    /// Operator-requested cancellation.
    Shutdown,
    /// The transport dropped underneath us.
    TransportLost(String),
    /// The sink queue stayed full past the enqueue timeout; the connection
    /// is deliberately dropped so the broker redelivers per its QoS.
    QueueStalled,
}

/// Owns the broker connection, its [`ConnectionState`], and the receive loop.
///
/// Records flow out through the bounded queue handed to [`new`](Self::new);
/// the manager has no knowledge of the sink beyond that sender.
pub struct SessionManager {
    connector: Arc<dyn BrokerConnector>,
    broker: BrokerConfig,
    topics: TopicSet,
    qos: QosLevel,
    backoff: BackoffPolicy,
    max_attempts: u32,
    enqueue_timeout: Duration,
    queue_capacity: usize,
    queue: mpsc::Sender<InboundRecord>,
    shutdown: Shutdown,
    state: ConnectionState,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        broker: BrokerConfig,
        topics: TopicSet,
        reconnect: &ReconnectConfig,
        pipeline: &PipelineConfig,
        queue: mpsc::Sender<InboundRecord>,
        shutdown: Shutdown,
    ) -> Self {
        let qos = broker.qos_level();
        Self {
            connector,
            broker,
            topics,
            qos,
            backoff: BackoffPolicy::from_config(reconnect),
            max_attempts: reconnect.max_attempts,
            enqueue_timeout: pipeline.enqueue_timeout(),
            queue_capacity: pipeline.queue_capacity,
            queue,
            shutdown,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = self.state.as_str(), to = next.as_str(), "connection state");
            self.state = next;
            metrics::set_connection_state(next);
        }
    }

    /// Run until cancelled or until the reconnect ceiling is exhausted.
    ///
    /// Returns `Ok(())` on operator-requested shutdown; returns
    /// [`BridgeError::ConnectionFailed`] from the terminal Failed state, which
    /// the caller turns into a non-zero exit.
    pub async fn run(mut self) -> Result<(), BridgeError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut failures: u32 = 0;
        let mut last_error = String::new();

        loop {
            if failures >= self.max_attempts {
                error!(
                    attempts = failures,
                    last_error = %last_error,
                    "reconnect ceiling exhausted; giving up"
                );
                self.transition(ConnectionState::Failed);
                return Err(BridgeError::ConnectionFailed {
                    attempts: failures,
                    last_error,
                });
            }

            if failures > 0 {
                let delay = self.backoff.delay(failures);
                debug!(attempt = failures + 1, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.recv() => {
                        self.transition(ConnectionState::Disconnected);
                        return Ok(());
                    }
                }
            }

            self.transition(ConnectionState::Connecting);
            info!(
                host = %self.broker.host,
                port = self.broker.port,
                client_id = %self.broker.client_id,
                "connecting to broker"
            );

            let connected = tokio::select! {
                result = self.connector.connect(&self.broker) => result,
                _ = shutdown_rx.recv() => {
                    self.transition(ConnectionState::Disconnected);
                    return Ok(());
                }
            };

            let ConnectedSession {
                mut session,
                session_present,
            } = match connected {
                Ok(connected) => connected,
                Err(e) => {
                    warn!(error = %e, code = e.error_code(), "broker connect failed");
                    failures += 1;
                    last_error = e.to_string();
                    self.transition(ConnectionState::Reconnecting);
                    continue;
                }
            };

            if session_present && self.broker.persistent_session {
                info!("broker resumed persistent session; skipping re-subscription");
            } else if let Err(reason) = self.establish_subscriptions(session.as_mut()).await {
                warn!(error = %reason, "subscription failed");
                failures += 1;
                last_error = reason;
                session.disconnect().await;
                self.transition(ConnectionState::Reconnecting);
                continue;
            }

            failures = 0;
            self.transition(ConnectionState::Connected);
            metrics::inc_connections();
            info!(topics = self.topics.len(), qos = self.qos.as_str(), "session established");

            match self.pump(session.as_mut(), &mut shutdown_rx).await {
                PumpExit::Shutdown => {
                    info!("shutdown requested; disconnecting cleanly");
                    session.disconnect().await;
                    self.transition(ConnectionState::Disconnected);
                    return Ok(());
                }
                PumpExit::TransportLost(reason) => {
                    warn!(error = %reason, "transport lost; scheduling reconnect");
                    metrics::inc_reconnects();
                    last_error = reason;
                    failures = 1;
                    self.transition(ConnectionState::Reconnecting);
                }
                PumpExit::QueueStalled => {
                    warn!(
                        timeout_ms = self.enqueue_timeout.as_millis() as u64,
                        "sink queue stalled; dropping connection to force broker redelivery"
                    );
                    metrics::inc_reconnects();
                    session.disconnect().await;
                    last_error = "sink queue stalled".into();
                    failures = 1;
                    self.transition(ConnectionState::Reconnecting);
                }
            }
        }
    }

    /// Issue the full subscription and log per-topic grants.
    ///
    /// A broker that rejects every filter leaves the session useless, so that
    /// case is folded into the failed-attempt path.
    async fn establish_subscriptions(
        &self,
        session: &mut dyn BrokerSession,
    ) -> Result<(), String> {
        let grants = session
            .subscribe(&self.topics, self.qos)
            .await
            .map_err(|e| e.to_string())?;

        let mut granted = 0usize;
        for grant in &grants {
            match grant.granted {
                Some(qos) => {
                    info!(filter = %grant.filter, qos = qos.as_str(), "subscribed");
                    granted += 1;
                }
                None => {
                    warn!(filter = %grant.filter, "broker rejected topic filter");
                    metrics::inc_subscribe_rejected();
                }
            }
        }
        if granted == 0 {
            return Err("broker rejected every topic filter".into());
        }
        Ok(())
    }

    /// The receive loop for one established session.
    async fn pump(
        &mut self,
        session: &mut dyn BrokerSession,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> PumpExit {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return PumpExit::Shutdown,
                event = session.next_event() => event,
            };

            match event {
                Ok(SessionEvent::Publish { topic, payload }) => {
                    metrics::inc_records_received();
                    let record = InboundRecord::now(topic, payload);
                    match self
                        .queue
                        .send_timeout(record, self.enqueue_timeout)
                        .await
                    {
                        Ok(()) => {
                            session.ack().await;
                            let depth = self.queue_capacity - self.queue.capacity();
                            metrics::set_queue_depth(depth as i64);
                        }
                        Err(SendTimeoutError::Timeout(record)) => {
                            // Not acked: at QoS 1 the broker redelivers this
                            // message on the next session.
                            error!(
                                topic = %record.topic,
                                payload = %String::from_utf8_lossy(&record.payload),
                                "enqueue timed out; record returns via broker redelivery"
                            );
                            return PumpExit::QueueStalled;
                        }
                        Err(SendTimeoutError::Closed(record)) => {
                            error!(
                                topic = %record.topic,
                                "sink queue closed while session active"
                            );
                            return PumpExit::Shutdown;
                        }
                    }
                }
                Err(e) => return PumpExit::TransportLost(e.0),
            }
        }
    }
}
