use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use crate::alert::Alerter;
use crate::record::{MonitoringRecord, Summarize};
use crate::sampler::ResourceSampler;
use crate::sink::RecordSink;

/// Instrumentation wrapper for long-running pipeline functions.
///
/// Wraps one call at a time: times it, samples resource usage, writes one
/// [`MonitoringRecord`] per invocation, and alerts on failure. The wrapped
/// result is always returned unchanged, including the error.
///
/// ```ignore
/// let monitor = Monitor::new(sink, alerter);
/// let summary = monitor
///     .run("refresh_accounts", || refresh_accounts(&pool))
///     .await?;
/// ```
pub struct Monitor<S, A> {
    sink: S,
    alerter: A,
}

impl<S, A> Monitor<S, A>
where
    S: RecordSink,
    A: Alerter,
{
    pub fn new(sink: S, alerter: A) -> Monitor<S, A> {
        Monitor { sink, alerter }
    }

    /// Runs `f` under monitoring.
    ///
    /// On success, exactly one success record is written and no alert is
    /// sent. On failure, exactly one alert is sent, one failure record is
    /// written, and the original error is returned unchanged. Failures in
    /// the alerting or persistence path are logged and never replace the
    /// monitored call's own outcome.
    pub async fn run<F, Fut, T, E>(&self, function: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Summarize,
        E: Display,
    {
        info!(function, "monitoring started");

        let started_at = Utc::now();
        let timer = Instant::now();
        let sampler = ResourceSampler::start();

        let result = f().await;

        let duration = timer.elapsed();
        let stats = sampler.stop();
        let finished_at = Utc::now();

        let record = match &result {
            Ok(value) => {
                info!(function, "monitored execution succeeded");

                MonitoringRecord::success(
                    function,
                    started_at,
                    finished_at,
                    duration,
                    stats,
                    value.summary(),
                )
            }
            Err(e) => {
                error!(function, error = %e, "monitored execution failed");

                let error_text = e.to_string();

                // Alert before persisting, so a broken monitoring table does
                // not also silence the alert.
                if let Err(alert_error) = self.alerter.send_failure(function, &error_text).await {
                    error!(
                        function,
                        error = %alert_error,
                        "failed to send the failure alert, the original error still propagates"
                    );
                }

                MonitoringRecord::failure(
                    function,
                    started_at,
                    finished_at,
                    duration,
                    stats,
                    error_text,
                )
            }
        };

        if let Err(sink_error) = self.sink.write(&record).await {
            error!(
                function,
                error = %sink_error,
                "failed to persist the monitoring record"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertError, MemoryAlerter};
    use crate::record::Outcome;
    use crate::sink::{MemoryRecordSink, MonitorStoreError};
    use async_trait::async_trait;
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    enum JobError {
        #[error("source table missing: {0}")]
        SourceMissing(String),
    }

    #[tokio::test]
    async fn success_writes_one_record_and_no_alert() {
        let monitor = Monitor::new(MemoryRecordSink::new(), MemoryAlerter::new());

        let result: Result<String, JobError> = monitor
            .run("refresh_accounts", || async {
                Ok("Refresh done. Total Records Updated: 42".to_owned())
            })
            .await;

        assert!(result.is_ok());

        let records = monitor.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].function, "refresh_accounts");
        assert_eq!(records[0].outcome, Outcome::Success);
        assert_eq!(records[0].records_updated, 42);
        assert!(records[0].error_message.is_empty());

        assert!(monitor.alerter.sent().is_empty());
    }

    #[tokio::test]
    async fn failure_alerts_once_and_propagates_the_original_error() {
        let monitor = Monitor::new(MemoryRecordSink::new(), MemoryAlerter::new());

        let result: Result<(), JobError> = monitor
            .run("refresh_accounts", || async {
                Err(JobError::SourceMissing("accounts_raw".to_owned()))
            })
            .await;

        // Same type, same message: the error is untouched.
        assert_eq!(
            result.unwrap_err(),
            JobError::SourceMissing("accounts_raw".to_owned())
        );

        let records = monitor.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Fail);
        assert_eq!(
            records[0].error_message,
            "source table missing: accounts_raw"
        );

        let alerts = monitor.alerter.sent();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "refresh_accounts");
        assert!(alerts[0].1.contains("accounts_raw"));
    }

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        async fn write(&self, _record: &MonitoringRecord) -> Result<(), MonitorStoreError> {
            Err(MonitorStoreError::Write(sqlx::Error::PoolClosed))
        }
    }

    struct FailingAlerter;

    #[async_trait]
    impl Alerter for FailingAlerter {
        async fn send_failure(&self, _: &str, _: &str) -> Result<(), AlertError> {
            Err(AlertError::InvalidAddress {
                address: "broken".to_owned(),
                source: "broken".parse::<lettre::message::Mailbox>().unwrap_err(),
            })
        }
    }

    #[tokio::test]
    async fn sink_failure_does_not_mask_a_success() {
        let monitor = Monitor::new(FailingSink, MemoryAlerter::new());

        let result: Result<String, JobError> = monitor
            .run("refresh_accounts", || async { Ok("done".to_owned()) })
            .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn secondary_failures_do_not_mask_the_original_error() {
        let monitor = Monitor::new(FailingSink, FailingAlerter);

        let result: Result<(), JobError> = monitor
            .run("refresh_accounts", || async {
                Err(JobError::SourceMissing("accounts_raw".to_owned()))
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            JobError::SourceMissing("accounts_raw".to_owned())
        );
    }
}
