//! Cancellation: clean shutdown drains in-flight work and exits zero.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MemorySink, ScriptStep, ScriptedBroker, test_config, wait_until};
use mqttsinkd::bridge;
use mqttsinkd::lifecycle::Shutdown;

#[tokio::test]
async fn shutdown_mid_stream_exits_cleanly() {
    let steps = (0..50)
        .map(|n| ScriptStep::publish("sensor/data", &format!("{n}")))
        .collect();
    let connector = Arc::new(ScriptedBroker::single_session(steps));
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();

    let bridge_task = tokio::spawn(bridge::run_pipeline(
        test_config(),
        connector,
        sink.clone(),
        shutdown.clone(),
    ));

    // Interrupt while records are flowing.
    assert!(wait_until(Duration::from_secs(5), || !sink.rows().is_empty()).await);
    shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), bridge_task)
        .await
        .expect("bridge did not shut down within the grace window")
        .expect("bridge task panicked");
    assert!(result.is_ok(), "clean shutdown must not report an error");
}

#[tokio::test]
async fn queued_records_are_drained_before_exit() {
    let steps = (0..5)
        .map(|n| ScriptStep::publish("sensor/data", &format!("{n}")))
        .collect();
    let connector = Arc::new(ScriptedBroker::single_session(steps));
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();

    let bridge_task = tokio::spawn(bridge::run_pipeline(
        test_config(),
        connector,
        sink.clone(),
        shutdown.clone(),
    ));

    // Let the whole script reach the queue, then cancel.
    assert!(wait_until(Duration::from_secs(5), || sink.rows().len() == 5).await);
    shutdown.trigger();
    bridge_task.await.unwrap().unwrap();

    assert_eq!(sink.rows().len(), 5, "drained records must all persist");
}
