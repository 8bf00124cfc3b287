use std::sync::Mutex;

use async_trait::async_trait;
use datakit_config::shared::MonitoringConfig;
use sqlx::PgPool;
use thiserror::Error;

use crate::record::MonitoringRecord;

/// Errors raised while persisting monitoring data.
#[derive(Debug, Error)]
pub enum MonitorStoreError {
    #[error("failed to write to the monitoring store: {0}")]
    Write(#[from] sqlx::Error),
}

/// Persists one [`MonitoringRecord`] per monitored invocation.
///
/// Like alerting, persistence failures are reported, not swallowed; the
/// monitor decides that they never mask the monitored call's own outcome.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(&self, record: &MonitoringRecord) -> Result<(), MonitorStoreError>;
}

/// Sink that appends records to the configured Postgres table.
pub struct PostgresRecordSink {
    pool: PgPool,
    table: String,
}

impl PostgresRecordSink {
    /// Creates a sink writing to `<table_schema>.<table_name>` from `config`.
    pub fn new(pool: PgPool, config: &MonitoringConfig) -> PostgresRecordSink {
        let table = format!(r#""{}"."{}""#, config.table_schema, config.table_name);

        PostgresRecordSink { pool, table }
    }

    /// Creates the monitoring table when it does not exist yet.
    ///
    /// Scripts on fresh databases call this once at startup; established
    /// deployments manage the table through migrations and skip it.
    pub async fn ensure_table(&self) -> Result<(), MonitorStoreError> {
        let statement = format!(
            r#"
            create table if not exists {} (
                id bigint generated always as identity primary key,
                function text not null,
                started_at timestamptz not null,
                finished_at timestamptz not null,
                duration_secs double precision not null,
                avg_cpu_pct double precision not null,
                peak_cpu_pct double precision not null,
                avg_mem_mb double precision not null,
                peak_mem_mb double precision not null,
                outcome text not null,
                error_message text not null,
                records_updated bigint not null
            )
            "#,
            self.table
        );

        sqlx::query(&statement).execute(&self.pool).await?;

        Ok(())
    }
}

#[async_trait]
impl RecordSink for PostgresRecordSink {
    async fn write(&self, record: &MonitoringRecord) -> Result<(), MonitorStoreError> {
        let statement = format!(
            r#"
            insert into {} (
                function, started_at, finished_at, duration_secs,
                avg_cpu_pct, peak_cpu_pct, avg_mem_mb, peak_mem_mb,
                outcome, error_message, records_updated
            )
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            self.table
        );

        sqlx::query(&statement)
            .bind(&record.function)
            .bind(record.started_at)
            .bind(record.finished_at)
            .bind(record.duration_secs)
            .bind(record.avg_cpu_pct)
            .bind(record.peak_cpu_pct)
            .bind(record.avg_mem_mb)
            .bind(record.peak_mem_mb)
            .bind(record.outcome.as_str())
            .bind(&record.error_message)
            .bind(record.records_updated)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Sink that keeps records in memory.
///
/// Used by tests and by scripts running against databases where the
/// monitoring table is not available.
#[derive(Default)]
pub struct MemoryRecordSink {
    records: Mutex<Vec<MonitoringRecord>>,
}

impl MemoryRecordSink {
    pub fn new() -> MemoryRecordSink {
        MemoryRecordSink::default()
    }

    /// Returns the records written so far.
    pub fn records(&self) -> Vec<MonitoringRecord> {
        self.records.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl RecordSink for MemoryRecordSink {
    async fn write(&self, record: &MonitoringRecord) -> Result<(), MonitorStoreError> {
        self.records
            .lock()
            .expect("sink lock poisoned")
            .push(record.clone());

        Ok(())
    }
}
