use serde::{Deserialize, Serialize};

use crate::SerializableSecretString;

/// Default REST API version used by the CRM connector.
const DEFAULT_API_VERSION: &str = "v59.0";

/// Configuration for the CRM (Salesforce-style) REST connector.
///
/// Authentication uses the OAuth2 password grant, which needs both the
/// connected-app credentials and the integration user's credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CrmConfig {
    /// Login endpoint, e.g. `https://login.salesforce.com`.
    pub base_url: String,
    /// REST API version, e.g. `v59.0`.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Connected-app consumer key.
    pub client_id: String,
    /// Connected-app consumer secret. Redacted in debug output.
    pub client_secret: SerializableSecretString,
    /// Username of the integration user.
    pub username: String,
    /// Password (with security token appended) of the integration user.
    /// Redacted in debug output.
    pub password: SerializableSecretString,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}
