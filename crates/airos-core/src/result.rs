use std::fmt;
use std::sync::Arc;

use airos_api::DeviceSnapshot;
use serde::Serialize;

/// Consecutive authentication failures after which the credentials are
/// assumed to be wrong rather than the session merely expired.
pub const CONFIG_PROBLEM_THRESHOLD: u32 = 2;

/// Outcome of one poll cycle.
///
/// Serializes with a `result` tag matching [`label`](Self::label).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum RefreshResult {
    #[serde(rename = "ok")]
    Snapshot(Arc<DeviceSnapshot>),
    /// Login failed or the device rejected the session.
    AuthError {
        message: String,
        /// Authentication failures in a row, including this one.
        consecutive: u32,
    },
    /// Device unreachable, timed out, or TLS failed.
    NetworkError { message: String },
    /// Device answered with something other than the expected payload.
    ProtocolError { message: String },
}

impl RefreshResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }

    pub fn snapshot(&self) -> Option<&Arc<DeviceSnapshot>> {
        match self {
            Self::Snapshot(s) => Some(s),
            _ => None,
        }
    }

    /// Repeated authentication failures usually mean bad credentials.
    pub fn is_config_problem(&self) -> bool {
        matches!(self, Self::AuthError { consecutive, .. } if *consecutive >= CONFIG_PROBLEM_THRESHOLD)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Snapshot(_) => None,
            Self::AuthError { message, .. }
            | Self::NetworkError { message }
            | Self::ProtocolError { message } => Some(message),
        }
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "ok",
            Self::AuthError { .. } => "auth-error",
            Self::NetworkError { .. } => "network-error",
            Self::ProtocolError { .. } => "protocol-error",
        }
    }
}

impl fmt::Display for RefreshResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot(s) => write!(
                f,
                "{} ({}): {} station(s)",
                s.hostname(),
                s.device_id(),
                s.station_count()
            ),
            Self::AuthError {
                message,
                consecutive,
            } => write!(f, "authentication failed ({consecutive}x): {message}"),
            Self::NetworkError { message } => write!(f, "network error: {message}"),
            Self::ProtocolError { message } => write!(f, "protocol error: {message}"),
        }
    }
}

/// Whether consumers can trust the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    /// No refresh has ever succeeded.
    NeverConnected,
    /// The last refresh succeeded.
    Available,
    /// A snapshot exists but the last refresh failed.
    Stale,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NeverConnected => "never connected",
            Self::Available => "available",
            Self::Stale => "stale",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_problem_after_two_auth_failures() {
        let first = RefreshResult::AuthError {
            message: "no session issued".into(),
            consecutive: 1,
        };
        let second = RefreshResult::AuthError {
            message: "no session issued".into(),
            consecutive: 2,
        };
        assert!(!first.is_config_problem());
        assert!(second.is_config_problem());
        assert!(
            !RefreshResult::NetworkError {
                message: "refused".into()
            }
            .is_config_problem()
        );
    }

    #[test]
    fn error_message_only_for_failures() {
        let err = RefreshResult::ProtocolError {
            message: "bad json".into(),
        };
        assert_eq!(err.error_message(), Some("bad json"));
        assert_eq!(err.label(), "protocol-error");
        assert!(!err.is_success());
    }

    #[test]
    fn serializes_with_result_tag() {
        let err = RefreshResult::AuthError {
            message: "no session issued".into(),
            consecutive: 2,
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap_or_default(),
            serde_json::json!({
                "result": "auth-error",
                "message": "no session issued",
                "consecutive": 2
            })
        );
        assert_eq!(
            serde_json::to_value(Availability::NeverConnected).unwrap_or_default(),
            serde_json::json!("never-connected")
        );
    }
}
