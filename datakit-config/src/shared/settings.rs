use serde::{Deserialize, Serialize};

use crate::Environment;
use crate::shared::{
    CrmConfig, MonitoringConfig, PgConnectionConfig, S3Config, ValidationError, WarehouseConfig,
};

/// The validated settings object for a data pipeline process.
///
/// Constructed once at process start via [`load_settings`] and passed by
/// reference to every component that needs it. Immutable after construction.
///
/// [`load_settings`]: crate::load_settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Environment tag, taken from `DK_ENVIRONMENT` rather than the file.
    #[serde(skip, default)]
    pub environment: Environment,
    /// Connection parameters for the team's Postgres database.
    pub postgres: PgConnectionConfig,
    /// Alerting and monitoring-table parameters.
    pub monitoring: MonitoringConfig,
    /// Object storage credentials, when the script uses S3.
    #[serde(default)]
    pub storage: Option<S3Config>,
    /// SQL warehouse credentials, when the script uses the warehouse.
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,
    /// CRM API credentials, when the script uses the CRM.
    #[serde(default)]
    pub crm: Option<CrmConfig>,
}

impl crate::Config for Settings {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["monitoring.recipients"];
}

impl Settings {
    /// Validates the loaded [`Settings`].
    ///
    /// Runs the semantic checks that deserialization cannot express, like
    /// non-zero pool sizes and plausible email addresses. The returned
    /// [`ValidationError`] names the offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.postgres.validate()?;
        self.monitoring.validate()?;

        Ok(())
    }
}
