//! PostgreSQL-backed record sink using SQLx.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use super::RecordSink;
use crate::config::StoreConfig;
use crate::record::{InboundRecord, PersistOutcome, PersistResult};

/// Sink handle with connection pool.
///
/// Cloneable; all clones share the pool. Checkout/checkin is handled inside
/// SQLx with guaranteed release on every exit path.
#[derive(Clone)]
pub struct PgSink {
    pool: PgPool,
    table: String,
    insert_sql: String,
}

impl PgSink {
    /// Connection acquire timeout - prevents a stalled pool from blocking
    /// workers indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open the connection pool against the configured store.
    pub async fn connect(config: &StoreConfig) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            table = %config.table,
            "store connected"
        );

        // The table name is validated as a plain identifier at config load.
        let insert_sql = format!(
            "INSERT INTO {} (topic, payload, received_at) VALUES ($1, $2, $3)",
            config.table
        );

        Ok(Self {
            pool,
            table: config.table.clone(),
            insert_sql,
        })
    }

    /// Create the target relation if it does not exist yet.
    ///
    /// `received_at` defaults to insertion time server-side, though the
    /// bridge always supplies its own receipt timestamp.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             topic TEXT NOT NULL, \
             payload BYTEA NOT NULL, \
             received_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        info!(table = %self.table, "store schema ensured");
        Ok(())
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordSink for PgSink {
    async fn persist(&self, record: InboundRecord) -> PersistOutcome {
        let result = sqlx::query(&self.insert_sql)
            .bind(record.topic.as_str())
            .bind(record.payload.as_ref())
            .bind(record.received_at)
            .execute(&self.pool)
            .await;

        let result = match result {
            Ok(_) => PersistResult::Success,
            Err(e) => classify(&e),
        };
        PersistOutcome { record, result }
    }
}

/// Sort a driver error into the retryable/fatal taxonomy.
fn classify(error: &sqlx::Error) -> PersistResult {
    match error {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => classify_sqlstate(&code, error.to_string()),
            None => PersistResult::Retryable(error.to_string()),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Protocol(_) => PersistResult::Retryable(error.to_string()),
        other => PersistResult::Fatal(other.to_string()),
    }
}

/// Classification by SQLSTATE.
///
/// Connection loss (08), serialization/deadlock (40), resource exhaustion
/// (53), and operator shutdown (57) resolve on retry. Data errors (22,
/// notably 22001 for a payload exceeding the column limit), constraint
/// violations (23), auth rejection (28), and schema mismatch (42) do not.
/// Unknown codes default to retryable; the bounded retry policy escalates
/// persistent ones regardless.
fn classify_sqlstate(code: &str, message: String) -> PersistResult {
    let class = code.get(..2).unwrap_or("");
    match class {
        "22" | "23" | "28" | "42" => PersistResult::Fatal(message),
        _ => PersistResult::Retryable(message),
    }
}
