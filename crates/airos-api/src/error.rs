use thiserror::Error;

/// Top-level error type for the `airos-api` crate.
///
/// Every variant falls into one of four [`ErrorKind`]s: connection,
/// authentication, protocol, or missing data. `airos-core` relies on the
/// kind to decide whether a failure invalidates the session.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, reset, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or handshake error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected, session cookies or CSRF token missing, or an
    /// authenticated call answered 401/403.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// Unexpected status code, or a body that is not the JSON shape the
    /// firmware normally sends.
    #[error("Protocol error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Protocol {
        message: String,
        status: Option<u16>,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// A field an operation needs is absent from an otherwise well-formed payload.
    #[error("Required field missing: {field}")]
    DataMissing { field: String },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Authentication,
    Protocol,
    DataMissing,
}

impl Error {
    pub(crate) fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>, status: Option<u16>, body: &str) -> Self {
        Self::Protocol {
            message: message.into(),
            status,
            body: body.to_owned(),
        }
    }

    /// Which failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Timeout { .. } | Self::Tls(_) | Self::InvalidUrl(_) => {
                ErrorKind::Connection
            }
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::DataMissing { .. } => ErrorKind::DataMissing,
        }
    }

    /// Returns `true` if the session is no longer valid and a fresh
    /// login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(Error::Timeout { timeout_secs: 5 }.kind(), ErrorKind::Connection);
        assert_eq!(Error::auth("nope").kind(), ErrorKind::Authentication);
        assert_eq!(
            Error::protocol("bad json", Some(200), "<html>").kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            Error::DataMissing { field: "mac".into() }.kind(),
            ErrorKind::DataMissing
        );
    }

    #[test]
    fn protocol_display_includes_status() {
        let err = Error::protocol("unexpected response", Some(500), "oops");
        assert_eq!(err.to_string(), "Protocol error (HTTP 500): unexpected response");

        let err = Error::protocol("not json", None, "");
        assert_eq!(err.to_string(), "Protocol error: not json");
    }

    #[test]
    fn only_auth_errors_expire_the_session() {
        assert!(Error::auth("expired").is_auth_expired());
        assert!(!Error::Timeout { timeout_secs: 1 }.is_auth_expired());
    }
}
