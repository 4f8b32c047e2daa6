//! rumqttc-backed broker transport.

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet,
    Publish, QoS, SubscribeFilter,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

use super::transport::{
    BrokerConnector, BrokerSession, ConnectedSession, SessionEvent, SubscribeGrant,
};
use crate::config::BrokerConfig;
use crate::error::{ConnectError, SubscribeError, TransportError};
use crate::record::{QosLevel, TopicSet};

/// Production connector speaking MQTT 3.1.1 via rumqttc.
pub struct MqttConnector;

#[async_trait]
impl BrokerConnector for MqttConnector {
    async fn connect(&self, config: &BrokerConfig) -> Result<ConnectedSession, ConnectError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(!config.persistent_session);
        // Publishes are acknowledged only after they reach the sink queue,
        // so an unacknowledged message survives a deliberately dropped
        // connection and is redelivered at QoS 1.
        options.set_manual_acks(true);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, event_loop) = AsyncClient::new(options, 16);
        let mut session = MqttSession {
            client,
            event_loop,
            pending: VecDeque::new(),
            unacked: None,
        };
        let session_present = session.await_connack().await?;
        debug!(
            host = %config.host,
            port = config.port,
            session_present,
            "broker handshake accepted"
        );
        Ok(ConnectedSession {
            session: Box::new(session),
            session_present,
        })
    }
}

struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    /// Publishes that raced ahead of a SUBACK (retained messages, persistent
    /// session replay) are buffered here and drained by `next_event`.
    pending: VecDeque<Publish>,
    /// The most recently delivered publish, awaiting acknowledgement.
    unacked: Option<Publish>,
}

impl MqttSession {
    /// Drive the event loop until the broker accepts or rejects the connect.
    async fn await_connack(&mut self) -> Result<bool, ConnectError> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return match ack.code {
                        ConnectReturnCode::Success => Ok(ack.session_present),
                        code => Err(map_return_code(code)),
                    };
                }
                Ok(_) => {}
                Err(e) => return Err(map_connection_error(e)),
            }
        }
    }

    fn take_publish(&mut self, publish: Publish) -> SessionEvent {
        let event = SessionEvent::Publish {
            topic: publish.topic.clone(),
            payload: publish.payload.clone(),
        };
        if publish.qos != QoS::AtMostOnce {
            self.unacked = Some(publish);
        }
        event
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn subscribe(
        &mut self,
        topics: &TopicSet,
        qos: QosLevel,
    ) -> Result<Vec<SubscribeGrant>, SubscribeError> {
        let requested = match qos {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        };
        let filters: Vec<SubscribeFilter> = topics
            .filters()
            .iter()
            .map(|f| SubscribeFilter::new(f.clone(), requested))
            .collect();
        self.client
            .subscribe_many(filters)
            .await
            .map_err(|e| SubscribeError::Transport(e.to_string()))?;

        // Drive the event loop until the SUBACK arrives; publishes racing
        // ahead of it are buffered for next_event.
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let grants = topics
                        .filters()
                        .iter()
                        .zip(ack.return_codes.iter())
                        .map(|(filter, code)| SubscribeGrant {
                            filter: filter.clone(),
                            granted: match code {
                                rumqttc::SubscribeReasonCode::Success(q) => Some(map_granted(*q)),
                                rumqttc::SubscribeReasonCode::Failure => None,
                            },
                        })
                        .collect();
                    return Ok(grants);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.pending.push_back(publish);
                }
                Ok(_) => {}
                Err(e) => return Err(SubscribeError::Transport(e.to_string())),
            }
        }
    }

    async fn next_event(&mut self) -> Result<SessionEvent, TransportError> {
        if let Some(publish) = self.pending.pop_front() {
            return Ok(self.take_publish(publish));
        }
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(self.take_publish(publish));
                }
                Ok(_) => {}
                Err(e) => return Err(TransportError(e.to_string())),
            }
        }
    }

    async fn ack(&mut self) {
        if let Some(publish) = self.unacked.take()
            && let Err(e) = self.client.ack(&publish).await
        {
            warn!(error = %e, "failed to queue puback");
        }
    }

    async fn disconnect(&mut self) {
        let _ = self.client.disconnect().await;
    }
}

fn map_granted(qos: QoS) -> QosLevel {
    match qos {
        QoS::AtMostOnce => QosLevel::AtMostOnce,
        QoS::AtLeastOnce | QoS::ExactlyOnce => QosLevel::AtLeastOnce,
    }
}

fn map_return_code(code: ConnectReturnCode) -> ConnectError {
    match code {
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
            ConnectError::Auth(format!("{code:?}"))
        }
        ConnectReturnCode::RefusedProtocolVersion | ConnectReturnCode::BadClientId => {
            ConnectError::Protocol(format!("{code:?}"))
        }
        other => ConnectError::Network(format!("{other:?}")),
    }
}

fn map_connection_error(error: ConnectionError) -> ConnectError {
    match error {
        ConnectionError::ConnectionRefused(code) => map_return_code(code),
        ConnectionError::NotConnAck(packet) => {
            ConnectError::Protocol(format!("expected CONNACK, got {packet:?}"))
        }
        ConnectionError::MqttState(e) => ConnectError::Protocol(e.to_string()),
        other => ConnectError::Network(other.to_string()),
    }
}
