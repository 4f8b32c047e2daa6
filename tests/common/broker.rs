//! Scripted broker transport for integration tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use mqttsinkd::broker::{
    BrokerConnector, BrokerSession, ConnectedSession, SessionEvent, SubscribeGrant,
};
use mqttsinkd::config::BrokerConfig;
use mqttsinkd::error::{ConnectError, SubscribeError, TransportError};
use mqttsinkd::record::{QosLevel, TopicSet};

/// One step a scripted session plays back from `next_event`.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver a publish.
    Publish { topic: String, payload: Bytes },
    /// Surface a transport error (connection lost).
    Fail(String),
}

impl ScriptStep {
    pub fn publish(topic: &str, payload: &str) -> Self {
        Self::Publish {
            topic: topic.to_string(),
            payload: Bytes::copy_from_slice(payload.as_bytes()),
        }
    }
}

/// What one successful connect hands back.
#[derive(Debug, Clone, Default)]
pub struct SessionScript {
    pub steps: Vec<ScriptStep>,
    pub session_present: bool,
    /// Filters the broker refuses in the SUBACK.
    pub reject_filters: Vec<String>,
}

impl SessionScript {
    pub fn publishing(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }
}

/// A connector that plays back a list of connect outcomes, then leaves any
/// further connect attempt pending forever (so tests can end with a clean
/// shutdown instead of racing the reconnect loop).
pub struct ScriptedBroker {
    connects: Mutex<VecDeque<Result<SessionScript, ConnectError>>>,
    pub connect_calls: AtomicU32,
    pub acks: Arc<AtomicU32>,
    pub disconnects: Arc<AtomicU32>,
}

impl ScriptedBroker {
    pub fn new(connects: Vec<Result<SessionScript, ConnectError>>) -> Self {
        Self {
            connects: Mutex::new(connects.into()),
            connect_calls: AtomicU32::new(0),
            acks: Arc::new(AtomicU32::new(0)),
            disconnects: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A broker that accepts one session playing the given steps.
    pub fn single_session(steps: Vec<ScriptStep>) -> Self {
        Self::new(vec![Ok(SessionScript::publishing(steps))])
    }
}

#[async_trait]
impl BrokerConnector for ScriptedBroker {
    async fn connect(&self, _config: &BrokerConfig) -> Result<ConnectedSession, ConnectError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.connects.lock().unwrap().pop_front();
        match next {
            Some(Ok(script)) => Ok(ConnectedSession {
                session_present: script.session_present,
                session: Box::new(ScriptedSession {
                    steps: script.steps.into(),
                    reject_filters: script.reject_filters,
                    acks: Arc::clone(&self.acks),
                    disconnects: Arc::clone(&self.disconnects),
                }),
            }),
            Some(Err(e)) => Err(e),
            // Script exhausted: hang until the test shuts the bridge down.
            None => std::future::pending().await,
        }
    }
}

struct ScriptedSession {
    steps: VecDeque<ScriptStep>,
    reject_filters: Vec<String>,
    acks: Arc<AtomicU32>,
    disconnects: Arc<AtomicU32>,
}

#[async_trait]
impl BrokerSession for ScriptedSession {
    async fn subscribe(
        &mut self,
        topics: &TopicSet,
        qos: QosLevel,
    ) -> Result<Vec<SubscribeGrant>, SubscribeError> {
        Ok(topics
            .filters()
            .iter()
            .map(|filter| SubscribeGrant {
                filter: filter.clone(),
                granted: if self.reject_filters.contains(filter) {
                    None
                } else {
                    Some(qos)
                },
            })
            .collect())
    }

    async fn next_event(&mut self) -> Result<SessionEvent, TransportError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Publish { topic, payload }) => {
                Ok(SessionEvent::Publish { topic, payload })
            }
            Some(ScriptStep::Fail(reason)) => Err(TransportError(reason)),
            // Script exhausted: behave like an idle broker.
            None => std::future::pending().await,
        }
    }

    async fn ack(&mut self) {
        self.acks.fetch_add(1, Ordering::SeqCst);
    }

    async fn disconnect(&mut self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
