//! End-to-end flow: scripted broker publish to persisted row.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{MemorySink, ScriptStep, ScriptedBroker, test_config, wait_until};
use mqttsinkd::bridge;
use mqttsinkd::lifecycle::Shutdown;

#[tokio::test]
async fn published_payload_lands_as_single_row() {
    let connector = Arc::new(ScriptedBroker::single_session(vec![ScriptStep::publish(
        "sensor/temperature",
        "23.5",
    )]));
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();

    let window_start = Utc::now();
    let bridge_task = tokio::spawn(bridge::run_pipeline(
        test_config(),
        connector.clone(),
        sink.clone(),
        shutdown.clone(),
    ));

    assert!(
        wait_until(Duration::from_secs(5), || !sink.rows().is_empty()).await,
        "record never reached the sink"
    );
    shutdown.trigger();
    bridge_task
        .await
        .expect("bridge task panicked")
        .expect("bridge exited with error");
    let window_end = Utc::now();

    let rows = sink.rows();
    assert_eq!(rows.len(), 1, "expected exactly one row");
    assert_eq!(rows[0].topic, "sensor/temperature");
    assert_eq!(rows[0].payload.as_ref(), b"23.5");
    assert!(rows[0].received_at >= window_start && rows[0].received_at <= window_end);

    // Acknowledged only after it reached the queue.
    assert_eq!(connector.acks.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn every_message_before_shutdown_produces_one_record() {
    let steps = (0..10)
        .map(|n| ScriptStep::publish("sensor/humidity", &format!("{n}")))
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

    assert!(wait_until(Duration::from_secs(5), || sink.rows().len() == 10).await);
    shutdown.trigger();
    bridge_task.await.unwrap().unwrap();

    let rows = sink.rows();
    assert_eq!(rows.len(), 10);
    // Single worker: receipt order is persist order.
    for (n, row) in rows.iter().enumerate() {
        assert_eq!(row.payload.as_ref(), format!("{n}").as_bytes());
    }
}
