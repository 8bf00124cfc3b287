use serde::{Deserialize, Serialize};

use crate::SerializableSecretString;

/// Configuration for the S3 object storage connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct S3Config {
    /// Name of the bucket all reads and writes go through.
    pub bucket: String,
    /// AWS region the bucket lives in.
    pub region: String,
    /// Key prefix prepended to every object key. Empty means the bucket root.
    #[serde(default)]
    pub prefix: String,
    /// Static access key id.
    pub access_key: String,
    /// Static secret access key. Redacted in debug output.
    pub secret_key: SerializableSecretString,
}
