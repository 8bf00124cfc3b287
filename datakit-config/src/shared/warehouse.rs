use serde::{Deserialize, Serialize};

use crate::SerializableSecretString;

/// Configuration for the SQL warehouse connector.
///
/// The warehouse is reached over its HTTP statement API, so this carries the
/// workspace endpoint and a personal access token rather than a wire-protocol
/// connection string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WarehouseConfig {
    /// Base URL of the workspace, e.g. `https://acme.cloud.example.com`.
    pub workspace_url: String,
    /// Identifier of the SQL warehouse statements execute on.
    pub warehouse_id: String,
    /// Personal access token used as a bearer token. Redacted in debug output.
    pub access_token: SerializableSecretString,
    /// Catalog statements run against.
    pub catalog: String,
    /// Schema statements run against.
    pub schema: String,
}
