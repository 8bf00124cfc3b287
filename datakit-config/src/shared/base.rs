use thiserror::Error;

/// Configuration validation errors.
///
/// These are semantic checks that run after deserialization succeeded, so
/// every variant names the exact field that is malformed.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The Postgres pool must be allowed at least one connection.
    #[error("`postgres.max_connections` cannot be zero")]
    MaxConnectionsZero,
    /// The SMTP port must be a valid, non-zero port number.
    #[error("`monitoring.smtp_port` cannot be zero")]
    SmtpPortZero,
    /// The alert sender address is not a plausible email address.
    #[error("`monitoring.sender` is not a valid email address: `{0}`")]
    InvalidSenderEmail(String),
    /// An alert recipient address is not a plausible email address.
    #[error("`monitoring.recipients` contains an invalid email address: `{0}`")]
    InvalidRecipientEmail(String),
}

/// Returns whether `address` looks like an email address.
///
/// This is a structural check (one `@` with a dotted domain), not a full
/// RFC 5321 parse. The SMTP library performs the authoritative parse when the
/// alert is actually sent.
pub(crate) fn is_plausible_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_addresses() {
        assert!(is_plausible_email("alerts@example.com"));
        assert!(is_plausible_email("first.last@sub.example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_plausible_email("nobody"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("user@"));
        assert!(!is_plausible_email("user@localhost"));
        assert!(!is_plausible_email("user@.com"));
        assert!(!is_plausible_email("user name@example.com"));
    }
}
