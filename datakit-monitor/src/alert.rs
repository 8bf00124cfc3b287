use std::sync::Mutex;

use async_trait::async_trait;
use datakit_config::shared::MonitoringConfig;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, warn};

/// Prefix of every alert email subject.
const SUBJECT_PREFIX: &str = "[ALERT]";

/// Errors raised while building or sending an alert email.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("invalid email address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("failed to build the alert message: {0}")]
    BuildMessage(#[from] lettre::error::Error),

    #[error("failed to send the alert over smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends one alert per monitored failure.
///
/// The monitor never lets an alerting failure mask the original error, so
/// implementations report failures through [`AlertError`] and leave the
/// swallowing to the caller.
#[async_trait]
pub trait Alerter: Send + Sync {
    /// Sends a failure alert for `function` with the error text.
    async fn send_failure(&self, function: &str, error_text: &str) -> Result<(), AlertError>;
}

/// Alerter that delivers over a plain SMTP relay.
pub struct SmtpAlerter {
    config: MonitoringConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpAlerter {
    /// Creates an alerter for the relay named in `config`.
    ///
    /// The relay is an internal, unauthenticated SMTP host, so the transport
    /// is built without TLS.
    pub fn new(config: MonitoringConfig) -> SmtpAlerter {
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.smtp_host.as_str())
                .port(config.smtp_port)
                .build();

        SmtpAlerter { config, transport }
    }
}

#[async_trait]
impl Alerter for SmtpAlerter {
    async fn send_failure(&self, function: &str, error_text: &str) -> Result<(), AlertError> {
        if self.config.recipients.is_empty() {
            warn!(function, "no alert recipients configured, skipping alert email");
            return Ok(());
        }

        let mut builder = Message::builder()
            .from(parse_mailbox(&self.config.sender)?)
            .subject(format!("{SUBJECT_PREFIX} Exception in {function}"));

        for recipient in &self.config.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let message = builder
            .header(ContentType::TEXT_PLAIN)
            .body(format!("An error occurred in {function}:\n\n{error_text}\n"))?;

        info!(
            function,
            recipients = self.config.recipients.len(),
            "sending failure alert email"
        );

        self.transport.send(message).await?;

        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, AlertError> {
    address.parse().map_err(|source| AlertError::InvalidAddress {
        address: address.to_owned(),
        source,
    })
}

/// Alerter that records alerts in memory instead of sending them.
///
/// Used by tests and local runs that must not reach the SMTP relay.
#[derive(Default)]
pub struct MemoryAlerter {
    alerts: Mutex<Vec<(String, String)>>,
}

impl MemoryAlerter {
    pub fn new() -> MemoryAlerter {
        MemoryAlerter::default()
    }

    /// Returns the `(function, error_text)` pairs recorded so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.alerts.lock().expect("alerter lock poisoned").clone()
    }
}

#[async_trait]
impl Alerter for MemoryAlerter {
    async fn send_failure(&self, function: &str, error_text: &str) -> Result<(), AlertError> {
        self.alerts
            .lock()
            .expect("alerter lock poisoned")
            .push((function.to_owned(), error_text.to_owned()));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_parse_failure_names_the_address() {
        let err = parse_mailbox("not-an-address").unwrap_err();
        assert!(err.to_string().contains("not-an-address"));
    }

    #[tokio::test]
    async fn memory_alerter_records_alerts() {
        let alerter = MemoryAlerter::new();
        alerter
            .send_failure("refresh_accounts", "boom")
            .await
            .unwrap();

        let sent = alerter.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "refresh_accounts");
        assert_eq!(sent[0].1, "boom");
    }
}
