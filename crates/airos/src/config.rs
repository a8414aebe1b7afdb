//! CLI configuration: thin wrapper around `airos_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--host, --username, --timeout).

use std::time::Duration;

use airos_core::DeviceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use airos_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.default_profile_name().to_owned())
}

/// Comma-separated profile names for diagnostics.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

/// Build a `DeviceConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile, `--host` alone is enough; the password
/// then comes from `AIROS_PASSWORD` or the keyring.
pub fn build_device_config(global: &GlobalOpts) -> Result<(DeviceConfig, String), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => {
            let host = global.host.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            Profile::new(host)
        }
    };

    let device = resolve_profile(&profile, &profile_name, &cfg.defaults, global)?;
    Ok((device, profile_name))
}

/// Translate a `Profile` + global flags into a `DeviceConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<DeviceConfig, CliError> {
    let mut profile = profile.clone();
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref username) = global.username {
        profile.username.clone_from(username);
    }

    let password = airos_config::resolve_password(&profile, profile_name)?;
    let mut device = airos_config::device_config_with_password(&profile, defaults, password)?;
    if let Some(secs) = global.timeout {
        device.timeout = Duration::from_secs(secs);
    }
    Ok(device)
}
