//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use airos_config::ConfigError;
use airos_core::{CoreError, RefreshResult};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PROTOCOL: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach device at {host}")]
    #[diagnostic(
        code(airos::connection_failed),
        help(
            "Check that the device is powered and reachable.\n\
             Reason: {reason}\n\
             Raise the timeout with --timeout if the link is slow."
        )
    )]
    ConnectionFailed { host: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(airos::auth_failed),
        help(
            "Verify the username and password for profile '{profile}'.\n\
             Run: airos config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(airos::no_credentials),
        help(
            "Configure credentials with: airos config init\n\
             Or set the AIROS_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Device ───────────────────────────────────────────────────────
    #[error("Unexpected response from device: {message}")]
    #[diagnostic(
        code(airos::protocol),
        help("The firmware may not be airOS 8, or the endpoint changed. Re-run with -vv for details.")
    )]
    Protocol { message: String },

    #[error("Station '{mac}' is not associated with this device")]
    #[diagnostic(
        code(airos::station_not_found),
        help("Run: airos stations to see associated stations")
    )]
    StationNotFound { mac: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(airos::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(airos::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: airos config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(airos::no_config),
        help(
            "Create a profile with: airos config init\n\
             Or pass --host and set AIROS_PASSWORD.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(airos::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(airos::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::StationNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Protocol { .. } => exit_code::PROTOCOL,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::NoConfig { .. } | Self::Config(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }

    /// Error for a failed poll cycle, or `None` on success.
    pub fn from_refresh(result: &RefreshResult, host: &str, profile: &str) -> Option<Self> {
        match result {
            RefreshResult::Snapshot(_) => None,
            RefreshResult::AuthError { message, .. } => Some(Self::AuthFailed {
                profile: profile.into(),
                message: message.clone(),
            }),
            RefreshResult::NetworkError { message } => Some(Self::ConnectionFailed {
                host: host.into(),
                reason: message.clone(),
            }),
            RefreshResult::ProtocolError { message } => Some(Self::Protocol {
                message: message.clone(),
            }),
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed {
                host: "(device)".into(),
                reason,
            },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::Protocol { message, status } => Self::Protocol {
                message: status.map_or_else(
                    || message.clone(),
                    |s| format!("{message} (HTTP {s})"),
                ),
            },
            CoreError::DataMissing { field } => Self::Protocol {
                message: format!("response is missing {field}"),
            },
            CoreError::StationNotFound { mac } => Self::StationNotFound { mac },
            CoreError::NotStarted => Self::Protocol {
                message: "no status snapshot available".into(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}
