//! The durable sink: persists records to the relational store.
//!
//! The sink owns the store connection pool exclusively. Each record is a
//! single-row atomic insert; every `persist` call yields exactly one
//! [`PersistOutcome`], never a silent drop. Payloads are stored as opaque
//! bytes; interpreting them is the business of downstream consumers of the
//! store, not of this process.

mod postgres;
mod retry;

pub use postgres::PgSink;
pub use retry::RetryingSink;

use async_trait::async_trait;

use crate::record::{InboundRecord, PersistOutcome};

/// Accepts a record, returns success or a (possibly retryable) failure.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn persist(&self, record: InboundRecord) -> PersistOutcome;
}
