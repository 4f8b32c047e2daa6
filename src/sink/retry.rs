//! Bounded retry decorator for sinks.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::RecordSink;
use crate::metrics;
use crate::record::{InboundRecord, PersistOutcome, PersistResult};

/// Wraps a sink with a bounded number of immediate retries for retryable
/// failures. Beyond the bound the outcome escalates to fatal; the record is
/// never held in memory past that point.
pub struct RetryingSink<S> {
    inner: S,
    max_retries: u32,
    retry_delay: Duration,
}

impl<S> RetryingSink<S> {
    pub fn new(inner: S, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            retry_delay,
        }
    }
}

#[async_trait]
impl<S: RecordSink> RecordSink for RetryingSink<S> {
    async fn persist(&self, record: InboundRecord) -> PersistOutcome {
        let mut attempt: u32 = 0;
        let mut outcome = self.inner.persist(record).await;
        loop {
            let PersistOutcome { record, result } = outcome;
            match result {
                PersistResult::Retryable(reason) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(
                        topic = %record.topic,
                        attempt,
                        max = self.max_retries,
                        reason = %reason,
                        "retrying persist"
                    );
                    metrics::inc_records_retried();
                    tokio::time::sleep(self.retry_delay).await;
                    outcome = self.inner.persist(record).await;
                }
                PersistResult::Retryable(reason) => {
                    return PersistOutcome {
                        record,
                        result: PersistResult::Fatal(format!(
                            "retries exhausted after {} attempts: {reason}",
                            attempt + 1
                        )),
                    };
                }
                result => return PersistOutcome { record, result },
            }
        }
    }
}
