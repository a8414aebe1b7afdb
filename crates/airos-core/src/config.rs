// ── Runtime device configuration ──
//
// Describes *how* to reach one device. Carries credential data and
// connection tuning but never touches disk; the CLI builds a
// `DeviceConfig` from a profile and hands it in.

use std::time::Duration;

use airos_api::{Credentials, LoginEncoding, TlsMode, TransportConfig};
use secrecy::SecretString;

/// Default time between background refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one airOS device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// IP address, hostname, or full URL.
    pub host: String,
    pub username: String,
    pub password: SecretString,
    pub login_encoding: LoginEncoding,
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Background refresh period. Zero disables the background task.
    pub poll_interval: Duration,
}

impl DeviceConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password,
            login_encoding: LoginEncoding::default(),
            tls: TlsMode::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub(crate) fn credentials(&self) -> Credentials {
        Credentials::new(self.host.clone(), self.username.clone(), self.password.clone())
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}
