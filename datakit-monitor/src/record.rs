use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::sampler::ResourceStats;

/// Matches `Total Records Updated: 123` in a run summary, case-insensitively.
static RECORDS_UPDATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)total\s+records\s+updated:\s*(\d+)").expect("records-updated regex is valid")
});

/// Outcome of a monitored invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Fail,
}

impl Outcome {
    /// The value persisted in the `outcome` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Fail => "Fail",
        }
    }
}

/// One row per monitored invocation.
///
/// Created once when the monitored call finishes and persisted through a
/// [`RecordSink`]; never mutated or re-read by this library.
///
/// [`RecordSink`]: crate::RecordSink
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringRecord {
    /// Label of the monitored function.
    pub function: String,
    /// When the monitored call started.
    pub started_at: DateTime<Utc>,
    /// When the monitored call finished.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in seconds, rounded to two decimals.
    pub duration_secs: f64,
    /// Average CPU usage over the run, in percent.
    pub avg_cpu_pct: f64,
    /// Peak CPU usage over the run, in percent.
    pub peak_cpu_pct: f64,
    /// Average resident memory over the run, in megabytes.
    pub avg_mem_mb: f64,
    /// Peak resident memory over the run, in megabytes.
    pub peak_mem_mb: f64,
    /// Whether the monitored call returned or failed.
    pub outcome: Outcome,
    /// Error text when the call failed, empty otherwise.
    pub error_message: String,
    /// Record count parsed from the run summary, 0 when absent.
    pub records_updated: i64,
}

impl MonitoringRecord {
    /// Builds the record for a call that returned normally.
    pub fn success(
        function: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration: Duration,
        stats: ResourceStats,
        summary: Option<&str>,
    ) -> MonitoringRecord {
        let records_updated = summary.map(extract_records_updated).unwrap_or(0);

        MonitoringRecord {
            function: function.to_owned(),
            started_at,
            finished_at,
            duration_secs: round2(duration.as_secs_f64()),
            avg_cpu_pct: round2(stats.avg_cpu_pct),
            peak_cpu_pct: round2(stats.peak_cpu_pct),
            avg_mem_mb: round2(stats.avg_mem_mb),
            peak_mem_mb: round2(stats.peak_mem_mb),
            outcome: Outcome::Success,
            error_message: String::new(),
            records_updated,
        }
    }

    /// Builds the record for a call that failed.
    pub fn failure(
        function: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration: Duration,
        stats: ResourceStats,
        error_message: String,
    ) -> MonitoringRecord {
        MonitoringRecord {
            function: function.to_owned(),
            started_at,
            finished_at,
            duration_secs: round2(duration.as_secs_f64()),
            avg_cpu_pct: round2(stats.avg_cpu_pct),
            peak_cpu_pct: round2(stats.peak_cpu_pct),
            avg_mem_mb: round2(stats.avg_mem_mb),
            peak_mem_mb: round2(stats.peak_mem_mb),
            outcome: Outcome::Fail,
            error_message,
            records_updated: 0,
        }
    }
}

/// Optional run summary extracted from a monitored function's return value.
///
/// ETL entry points conventionally return a human-readable summary string
/// ending in `Total Records Updated: <n>`; the monitor parses that count into
/// the record. Types without a meaningful summary use the default.
pub trait Summarize {
    /// Summary text to scan for the records-updated count, if any.
    fn summary(&self) -> Option<&str> {
        None
    }
}

impl Summarize for String {
    fn summary(&self) -> Option<&str> {
        Some(self)
    }
}

impl Summarize for &str {
    fn summary(&self) -> Option<&str> {
        Some(self)
    }
}

impl Summarize for () {}

impl Summarize for i64 {}
impl Summarize for u64 {}
impl Summarize for bool {}

/// Parses `Total Records Updated: <n>` from a summary string.
///
/// Returns 0 when the marker is absent or the number does not fit an `i64`.
pub fn extract_records_updated(text: &str) -> i64 {
    RECORDS_UPDATED_RE
        .captures(text)
        .and_then(|captures| captures[1].parse().ok())
        .unwrap_or(0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_count() {
        assert_eq!(extract_records_updated("Total Records Updated: 123"), 123);
        assert_eq!(
            extract_records_updated("refresh done.\ntotal records updated:42"),
            42
        );
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(extract_records_updated("TOTAL RECORDS UPDATED: 7"), 7);
    }

    #[test]
    fn missing_marker_yields_zero() {
        assert_eq!(extract_records_updated("refresh complete"), 0);
        assert_eq!(extract_records_updated(""), 0);
    }

    #[test]
    fn overflowing_count_yields_zero() {
        assert_eq!(
            extract_records_updated("Total Records Updated: 99999999999999999999999"),
            0
        );
    }

    #[test]
    fn success_record_parses_the_summary() {
        let now = Utc::now();
        let record = MonitoringRecord::success(
            "refresh_accounts",
            now,
            now,
            Duration::from_millis(1234),
            ResourceStats::default(),
            Some("Total Records Updated: 10"),
        );

        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.records_updated, 10);
        assert_eq!(record.duration_secs, 1.23);
        assert!(record.error_message.is_empty());
    }

    #[test]
    fn failure_record_keeps_the_error_text() {
        let now = Utc::now();
        let record = MonitoringRecord::failure(
            "refresh_accounts",
            now,
            now,
            Duration::from_secs(2),
            ResourceStats::default(),
            "source table missing".to_owned(),
        );

        assert_eq!(record.outcome, Outcome::Fail);
        assert_eq!(record.error_message, "source table missing");
        assert_eq!(record.records_updated, 0);
    }
}
