use serde::{Deserialize, Serialize};

use crate::shared::{ValidationError, is_plausible_email};

/// Default sender address for alert emails.
const DEFAULT_SENDER: &str = "noreply@example.com";

/// Default schema of the monitoring summary table.
const DEFAULT_TABLE_SCHEMA: &str = "public";

/// Default name of the monitoring summary table.
const DEFAULT_TABLE_NAME: &str = "pipeline_monitoring";

/// Configuration for the monitor wrapper: alert email delivery and the
/// destination table for monitoring records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitoringConfig {
    /// Addresses that receive failure alerts. Alerting is skipped when empty.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Sender address used for alert emails.
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Hostname of the SMTP relay.
    pub smtp_host: String,
    /// Port of the SMTP relay.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Schema of the monitoring summary table.
    #[serde(default = "default_table_schema")]
    pub table_schema: String,
    /// Name of the monitoring summary table.
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

fn default_sender() -> String {
    DEFAULT_SENDER.to_owned()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_table_schema() -> String {
    DEFAULT_TABLE_SCHEMA.to_owned()
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_owned()
}

impl MonitoringConfig {
    /// Validates the alerting fields of this config.
    ///
    /// An empty recipient list is allowed (alerting is then skipped at
    /// runtime), but every listed recipient and the sender must be a
    /// plausible email address and the SMTP port must be non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.smtp_port == 0 {
            return Err(ValidationError::SmtpPortZero);
        }

        if !is_plausible_email(&self.sender) {
            return Err(ValidationError::InvalidSenderEmail(self.sender.clone()));
        }

        for recipient in &self.recipients {
            if !is_plausible_email(recipient) {
                return Err(ValidationError::InvalidRecipientEmail(recipient.clone()));
            }
        }

        Ok(())
    }
}
