//! The bounded queue between the receive loop and the sink workers.
//!
//! Record ownership transfers from the session manager to a worker through
//! the channel; each worker persists records one at a time and consumes the
//! resulting [`PersistOutcome`] as an operator-visible log line plus metric.
//! On shutdown, workers drain the queue up to a bounded grace period and
//! abandon whatever remains, logging each abandoned record in full for
//! manual replay.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, trace};

use crate::lifecycle::Shutdown;
use crate::metrics;
use crate::record::{InboundRecord, PersistResult};
use crate::sink::RecordSink;

/// Handles to the spawned sink workers.
pub struct SinkWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl SinkWorkers {
    /// Wait for every worker to finish (queue closed and drained, or grace
    /// period expired).
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Spawn `workers` sink tasks consuming the shared receiver.
///
/// With one worker, records from a topic are persisted in receipt order.
/// More workers trade that ordering for throughput; the receiver is shared
/// behind a mutex, released while a persist is in flight so the others can
/// keep pulling.
pub fn spawn_sink_workers(
    workers: usize,
    rx: mpsc::Receiver<InboundRecord>,
    sink: Arc<dyn RecordSink>,
    shutdown: &Shutdown,
    grace: Duration,
) -> SinkWorkers {
    let rx = Arc::new(Mutex::new(rx));
    let handles = (0..workers)
        .map(|worker_id| {
            let rx = Arc::clone(&rx);
            let sink = Arc::clone(&sink);
            let shutdown_rx = shutdown.subscribe();
            tokio::spawn(worker_loop(worker_id, rx, sink, shutdown_rx, grace))
        })
        .collect();
    SinkWorkers { handles }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<InboundRecord>>>,
    sink: Arc<dyn RecordSink>,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    grace: Duration,
) {
    loop {
        // The lock is held only while waiting for a record, never across a
        // persist call.
        let record = {
            let mut guard = rx.lock().await;
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    drop(guard);
                    drain(worker_id, &rx, sink.as_ref(), grace).await;
                    return;
                }
                record = guard.recv() => record,
            }
        };
        match record {
            Some(record) => handle_record(sink.as_ref(), record).await,
            // Channel closed and empty: the session manager is gone.
            None => return,
        }
    }
}

/// Post-shutdown drain: keep persisting until the queue is empty or the
/// grace period expires, then abandon the remainder.
async fn drain(
    worker_id: usize,
    rx: &Mutex<mpsc::Receiver<InboundRecord>>,
    sink: &dyn RecordSink,
    grace: Duration,
) {
    let deadline = Instant::now() + grace;
    loop {
        let record = {
            let mut guard = rx.lock().await;
            // timeout_at alone is not enough: it reports Ok for a ready
            // receiver even past the deadline, so the deadline is checked
            // explicitly between records.
            if Instant::now() >= deadline {
                abandon_remaining(worker_id, &mut guard);
                return;
            }
            match tokio::time::timeout_at(deadline, guard.recv()).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    info!(worker = worker_id, "queue drained");
                    return;
                }
                Err(_) => {
                    abandon_remaining(worker_id, &mut guard);
                    return;
                }
            }
        };
        handle_record(sink, record).await;
    }
}

/// Log and count every record still queued; called once the grace period is
/// gone. Full content goes to the log so the operator can replay by hand.
fn abandon_remaining(worker_id: usize, rx: &mut mpsc::Receiver<InboundRecord>) {
    let mut abandoned = 0usize;
    while let Ok(record) = rx.try_recv() {
        error!(
            topic = %record.topic,
            payload = %String::from_utf8_lossy(&record.payload),
            received_at = %record.received_at,
            "shutdown grace expired; record abandoned"
        );
        metrics::inc_records_lost();
        abandoned += 1;
    }
    if abandoned > 0 {
        error!(worker = worker_id, abandoned, "abandoned queued records");
    }
}

/// Persist one record and consume its outcome.
async fn handle_record(sink: &dyn RecordSink, record: InboundRecord) {
    let start = Instant::now();
    let outcome = sink.persist(record).await;
    metrics::observe_persist_seconds(start.elapsed().as_secs_f64());

    match outcome.result {
        PersistResult::Success => {
            trace!(topic = %outcome.record.topic, "record persisted");
            metrics::inc_records_persisted();
        }
        PersistResult::Retryable(reason) | PersistResult::Fatal(reason) => {
            // Full content so the operator can replay by hand.
            error!(
                topic = %outcome.record.topic,
                payload = %String::from_utf8_lossy(&outcome.record.payload),
                received_at = %outcome.record.received_at,
                reason = %reason,
                "record lost"
            );
            metrics::inc_records_lost();
        }
    }
}
