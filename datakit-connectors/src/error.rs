use thiserror::Error;

/// Errors raised while constructing a connector client.
///
/// Once a client exists, its own error type takes over; these errors only
/// cover the factory itself.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("the `{0}` section is missing from the settings")]
    NotConfigured(&'static str),

    #[error("failed to prepare the database path: {0}")]
    Io(#[from] std::io::Error),
}
