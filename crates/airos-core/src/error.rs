// ── Core error types ──
//
// Errors surfaced to consumers of airos-core. The `From<airos_api::Error>`
// impl folds transport-layer detail into the four failure classes callers
// act on.

use thiserror::Error;

use airos_api::ErrorKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Cannot reach device: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Unexpected device response: {message}")]
    Protocol {
        message: String,
        status: Option<u16>,
    },

    #[error("Device response is missing {field}")]
    DataMissing { field: String },

    // ── Poller errors ────────────────────────────────────────────────
    #[error("Station not found: {mac}")]
    StationNotFound { mac: String },

    #[error("Poller not started; no snapshot available")]
    NotStarted,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Failure class, aligned with [`airos_api::ErrorKind`] where one applies.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ConnectionFailed { .. } => Some(ErrorKind::Connection),
            Self::AuthenticationFailed { .. } => Some(ErrorKind::Authentication),
            Self::Protocol { .. } => Some(ErrorKind::Protocol),
            Self::DataMissing { .. } => Some(ErrorKind::DataMissing),
            Self::StationNotFound { .. } | Self::NotStarted | Self::Config { .. } => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<airos_api::Error> for CoreError {
    fn from(err: airos_api::Error) -> Self {
        match err {
            airos_api::Error::Authentication { message } => Self::AuthenticationFailed { message },
            airos_api::Error::Protocol { message, status, .. } => Self::Protocol { message, status },
            airos_api::Error::DataMissing { field } => Self::DataMissing { field },
            airos_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid device URL: {e}"),
            },
            other @ (airos_api::Error::Transport(_)
            | airos_api::Error::Timeout { .. }
            | airos_api::Error::Tls(_)) => Self::ConnectionFailed {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_their_class() {
        let err: CoreError = airos_api::Error::Timeout { timeout_secs: 5 }.into();
        assert_eq!(err.kind(), Some(ErrorKind::Connection));
        assert!(err.to_string().contains("timed out after 5s"));

        let err: CoreError = airos_api::Error::Authentication {
            message: "no session issued".into(),
        }
        .into();
        assert_eq!(err.kind(), Some(ErrorKind::Authentication));

        let err: CoreError = airos_api::Error::Protocol {
            message: "bad".into(),
            status: Some(500),
            body: String::new(),
        }
        .into();
        assert!(matches!(err, CoreError::Protocol { status: Some(500), .. }));
    }

    #[test]
    fn poller_errors_have_no_api_kind() {
        assert_eq!(CoreError::NotStarted.kind(), None);
        let err = CoreError::StationNotFound {
            mac: "aa:bb:cc:dd:ee:ff".into(),
        };
        assert_eq!(err.to_string(), "Station not found: aa:bb:cc:dd:ee:ff");
    }
}
