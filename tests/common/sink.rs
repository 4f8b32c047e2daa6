//! In-memory sinks for observing what the pipeline persists.

use async_trait::async_trait;
use std::sync::Mutex;

use mqttsinkd::record::{InboundRecord, PersistOutcome, PersistResult};
use mqttsinkd::sink::RecordSink;

/// Records every persisted row.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<InboundRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<InboundRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn persist(&self, record: InboundRecord) -> PersistOutcome {
        self.rows.lock().unwrap().push(record.clone());
        PersistOutcome {
            record,
            result: PersistResult::Success,
        }
    }
}

/// A sink whose persist never completes, simulating a wedged store.
pub struct StallSink;

#[async_trait]
impl RecordSink for StallSink {
    async fn persist(&self, _record: InboundRecord) -> PersistOutcome {
        std::future::pending().await
    }
}
