use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;

/// Default placeholder for unset log fields, kept for downstream reports that
/// filter on it.
const NONE_PROVIDED: &str = "None Provided";

/// Classification of a pipeline log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Info,
    Exception,
    Other,
}

impl EntryKind {
    fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Info => "INFO",
            EntryKind::Exception => "EXCEPTION",
            EntryKind::Other => "OTHER",
        }
    }
}

/// Result column of a pipeline log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryResult {
    Success,
    Fail,
    Other,
}

impl EntryResult {
    fn as_str(&self) -> &'static str {
        match self {
            EntryResult::Success => "SUCCESS",
            EntryResult::Fail => "FAIL",
            EntryResult::Other => "OTHER",
        }
    }
}

/// Writes refresh events for one data table into the shared pipeline log
/// table.
///
/// Logging here is best-effort: a failed insert is reported through tracing
/// and never propagated, so a broken log table cannot fail the pipeline it
/// describes.
pub struct PipelineLog {
    pool: PgPool,
    log_table: String,
    data_table: String,
    object: String,
}

impl PipelineLog {
    /// Creates a logger for `data_table`, writing into `log_table`.
    ///
    /// `object` names the logical entity being processed, which can differ
    /// from the table when one table holds several objects.
    pub fn new(pool: PgPool, log_table: &str, data_table: &str, object: &str) -> PipelineLog {
        PipelineLog {
            pool,
            log_table: log_table.to_owned(),
            data_table: data_table.to_owned(),
            object: object.to_owned(),
        }
    }

    /// Logs a successful refresh of the data table.
    pub async fn log_completion(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        record_count: i64,
    ) {
        let message = format!("{} Refresh Complete", self.data_table);
        let description = format!("{record_count} Records Refreshed");

        self.add_entry(
            EntryKind::Info,
            EntryResult::Success,
            start_time,
            end_time,
            &message,
            &description,
            NONE_PROVIDED,
        )
        .await;
    }

    /// Logs a refresh failure.
    ///
    /// `detail` carries the error chain or backtrace text; `context` is an
    /// optional free-form note about what the pipeline was doing.
    pub async fn log_error(
        &self,
        event_time: DateTime<Utc>,
        error_message: &str,
        detail: &str,
        context: Option<&str>,
    ) {
        self.add_entry(
            EntryKind::Exception,
            EntryResult::Fail,
            event_time,
            event_time,
            error_message,
            detail,
            context.unwrap_or(NONE_PROVIDED),
        )
        .await;
    }

    /// Logs an entry that is neither a completion nor an error.
    pub async fn log_other(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        message: &str,
        description: &str,
    ) {
        self.add_entry(
            EntryKind::Other,
            EntryResult::Other,
            start_time,
            end_time,
            message,
            description,
            NONE_PROVIDED,
        )
        .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn add_entry(
        &self,
        kind: EntryKind,
        result: EntryResult,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        message: &str,
        sub_message: &str,
        sup_message: &str,
    ) {
        let statement = format!(
            r#"
            insert into "{}" (
                data_table, object, log_type, result,
                message, sub_message, sup_message,
                start_timestamp, end_timestamp
            )
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            self.log_table
        );

        let outcome = sqlx::query(&statement)
            .bind(&self.data_table)
            .bind(&self.object)
            .bind(kind.as_str())
            .bind(result.as_str())
            .bind(message)
            .bind(sub_message)
            .bind(sup_message)
            .bind(start_time)
            .bind(end_time)
            .execute(&self.pool)
            .await;

        if let Err(e) = outcome {
            error!(
                log_table = %self.log_table,
                data_table = %self.data_table,
                error = %e,
                "failed to write to the pipeline log table"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kinds_map_to_their_column_values() {
        assert_eq!(EntryKind::Info.as_str(), "INFO");
        assert_eq!(EntryKind::Exception.as_str(), "EXCEPTION");
        assert_eq!(EntryKind::Other.as_str(), "OTHER");
    }

    #[test]
    fn entry_results_map_to_their_column_values() {
        assert_eq!(EntryResult::Success.as_str(), "SUCCESS");
        assert_eq!(EntryResult::Fail.as_str(), "FAIL");
        assert_eq!(EntryResult::Other.as_str(), "OTHER");
    }
}
