//! Backpressure: a full queue blocks the receive loop instead of dropping
//! records, and a stalled sink eventually forces a deliberate reconnect.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{ScriptStep, ScriptedBroker, SessionScript, StallSink, test_config, wait_until};
use mqttsinkd::broker::SessionManager;
use mqttsinkd::lifecycle::Shutdown;
use mqttsinkd::pipeline::spawn_sink_workers;
use mqttsinkd::record::TopicSet;
use tokio::sync::mpsc;

#[tokio::test]
async fn stalled_sink_forces_deliberate_reconnect() {
    let mut config = test_config();
    config.pipeline.queue_capacity = 2;
    config.pipeline.workers = 1;
    config.pipeline.enqueue_timeout_ms = 200;

    // One in-flight at the stalled worker, two queued, the fourth must block
    // the receive loop past the enqueue timeout.
    let connector = Arc::new(ScriptedBroker::new(vec![Ok(SessionScript::publishing(
        vec![
            ScriptStep::publish("sensor/temperature", "1"),
            ScriptStep::publish("sensor/temperature", "2"),
            ScriptStep::publish("sensor/temperature", "3"),
            ScriptStep::publish("sensor/temperature", "4"),
        ],
    ))]));

    let shutdown = Shutdown::new();
    let (queue_tx, queue_rx) = mpsc::channel(config.pipeline.queue_capacity);
    // Workers are deliberately wedged; the test never joins them.
    let _workers = spawn_sink_workers(
        config.pipeline.workers,
        queue_rx,
        Arc::new(StallSink),
        &shutdown,
        config.pipeline.shutdown_grace(),
    );

    let topics = TopicSet::new(config.broker.topics.clone()).unwrap();
    let manager = SessionManager::new(
        connector.clone(),
        config.broker.clone(),
        topics,
        &config.reconnect,
        &config.pipeline,
        queue_tx,
        shutdown.clone(),
    );
    let manager_task = tokio::spawn(manager.run());

    // The enqueue timeout fires, the session is dropped, and a reconnect is
    // attempted (the script is exhausted, so the second connect just hangs).
    assert!(
        wait_until(Duration::from_secs(5), || {
            connector.connect_calls.load(Ordering::SeqCst) >= 2
        })
        .await,
        "stalled queue never triggered a reconnect"
    );
    assert!(connector.disconnects.load(Ordering::SeqCst) >= 1);

    // Only the records that made it into the queue were acknowledged (two
    // queued, plus one the worker may have pulled before wedging); the
    // blocked one stays unacked for broker redelivery.
    let acks = connector.acks.load(Ordering::SeqCst);
    assert!((2..=3).contains(&acks), "unexpected ack count {acks}");

    shutdown.trigger();
    manager_task.await.unwrap().unwrap();
}
