//! Shared configuration for airOS tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `airos_core::DeviceConfig`. The CLI adds flag-aware
//! wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use airos_core::{DeviceConfig, LoginEncoding, TlsMode};

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "airos";

/// Environment variable consulted for the password after `password_env`.
pub const PASSWORD_ENV: &str = "AIROS_PASSWORD";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "AIROS_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found in config")]
    UnknownProfile { profile: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval in seconds for `watch`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    airos_core::DEFAULT_TIMEOUT.as_secs()
}
fn default_poll_interval() -> u64 {
    airos_core::DEFAULT_POLL_INTERVAL.as_secs()
}

/// A named device profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Device address: IP, hostname, or full URL.
    pub host: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// Password (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Login body encoding: "form" or "json".
    #[serde(default)]
    pub login_encoding: LoginEncoding,

    /// Verify the device certificate against the system store.
    #[serde(default)]
    pub verify_tls: bool,

    /// Override timeout (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Override poll interval (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
}

fn default_username() -> String {
    "ubnt".into()
}

impl Profile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: default_username(),
            password: None,
            password_env: None,
            login_encoding: LoginEncoding::default(),
            verify_tls: false,
            timeout: None,
            poll_interval: None,
        }
    }
}

impl Config {
    /// Name of the profile to use when none is requested explicitly.
    pub fn default_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `AIROS_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "airos", "airos").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("airos");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` layered under `AIROS_*` environment overrides.
///
/// Nested keys use a double underscore:
/// `AIROS_PROFILES__HOME__HOST=10.0.0.2`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("AIROS_")
                .ignore(&["password", "config", "log"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_key(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name))
        .and_then(|entry| entry.get_password())
        .ok()
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

/// Resolve a profile's password from the credential chain:
///
/// 1. the env var named by `password_env`
/// 2. `AIROS_PASSWORD`
/// 3. the system keyring (`airos`, `<profile>/password`)
/// 4. plaintext `password` in the profile
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        keyring_password,
    )
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        debug!(source = "password_env", "password resolved");
        return Ok(SecretString::from(pw));
    }

    if let Some(pw) = env(PASSWORD_ENV) {
        debug!(source = PASSWORD_ENV, "password resolved");
        return Ok(SecretString::from(pw));
    }

    if let Some(pw) = keyring(profile_name) {
        debug!(source = "keyring", "password resolved");
        return Ok(SecretString::from(pw));
    }

    if let Some(ref pw) = profile.password {
        debug!(source = "config", "password resolved");
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Build a `DeviceConfig` from a profile without CLI overrides.
pub fn profile_to_device_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    let password = resolve_password(profile, profile_name)?;
    device_config_with_password(profile, defaults, password)
}

/// Build a `DeviceConfig` from a profile and an already-resolved password.
pub fn device_config_with_password(
    profile: &Profile,
    defaults: &Defaults,
    password: SecretString,
) -> Result<DeviceConfig, ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config = DeviceConfig::new(host, profile.username.clone(), password);
    config.login_encoding = profile.login_encoding;
    config.tls = if profile.verify_tls {
        TlsMode::System
    } else {
        // airOS ships a self-signed certificate.
        TlsMode::DangerAcceptInvalid
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval));
    Ok(config)
}
