//! Bridge wiring: builds the pipeline from config and runs it to completion.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::broker::{BrokerConnector, MqttConnector, SessionManager};
use crate::config::Config;
use crate::lifecycle::Shutdown;
use crate::pipeline;
use crate::record::TopicSet;
use crate::sink::{PgSink, RecordSink, RetryingSink};
use crate::{http, metrics};

/// Run the bridge until shutdown or terminal connection failure.
///
/// Returns `Ok(())` on operator-requested shutdown (process exits 0) and an
/// error once the reconnect ceiling is exhausted (process exits non-zero).
pub async fn run(config: Config) -> anyhow::Result<()> {
    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    if config.metrics_port == 0 {
        info!("metrics disabled");
    } else {
        metrics::init();
        let port = config.metrics_port;
        tokio::spawn(async move {
            http::run_http_server(port).await;
        });
        info!(port, "metrics endpoint started");
    }

    let pg = PgSink::connect(&config.store).await?;
    pg.ensure_schema().await?;
    let sink: Arc<dyn RecordSink> = Arc::new(RetryingSink::new(
        pg,
        config.pipeline.persist_max_retries,
        config.pipeline.persist_retry_delay(),
    ));

    // Operator-requested cancellation.
    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received; shutting down");
                shutdown.trigger();
            }
        });
    }

    run_pipeline(config, Arc::new(MqttConnector), sink, shutdown).await
}

/// Assemble queue, workers, and session manager around an arbitrary
/// connector and sink.
///
/// This is the seam integration tests use: a scripted connector, an
/// in-memory sink, and a shutdown handle they control.
pub async fn run_pipeline(
    config: Config,
    connector: Arc<dyn BrokerConnector>,
    sink: Arc<dyn RecordSink>,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let topics = TopicSet::new(config.broker.topics.clone())?;

    let (queue_tx, queue_rx) = mpsc::channel(config.pipeline.queue_capacity);
    let workers = pipeline::spawn_sink_workers(
        config.pipeline.workers,
        queue_rx,
        sink,
        &shutdown,
        config.pipeline.shutdown_grace(),
    );

    let manager = SessionManager::new(
        connector,
        config.broker.clone(),
        topics,
        &config.reconnect,
        &config.pipeline,
        queue_tx,
        shutdown.clone(),
    );

    // When the manager returns its queue sender drops, so the workers see
    // the channel close and drain whatever is left.
    let result = manager.run().await;
    workers.join().await;

    result.map_err(Into::into)
}
