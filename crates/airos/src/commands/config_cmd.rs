//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};

use airos_core::LoginEncoding;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

/// Render a redacted config as TOML.
fn format_config_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password() -> Result<String, CliError> {
    let pass = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if pass.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(pass)
}

/// Store the password in the keyring, or hand it back for plaintext config.
fn prompt_password_storage(profile_name: &str, password: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        airos_config::store_password(profile_name, &password)?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password))
    }
}

fn profile_or_err<'a>(cfg: &'a Config, name: &str) -> Result<&'a Profile, CliError> {
    cfg.profiles
        .get(name)
        .ok_or_else(|| CliError::ProfileNotFound {
            name: name.into(),
            available: config::available_profiles(cfg),
        })
}

// ── Init ────────────────────────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("airOS CLI configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let mut cfg = config::load_config_or_default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;

    if cfg.profiles.contains_key(&profile_name) {
        let overwrite = Confirm::new()
            .with_prompt(format!("Profile '{profile_name}' exists. Overwrite?"))
            .default(false)
            .interact()
            .map_err(prompt_err)?;
        if !overwrite {
            return Ok(());
        }
    }

    let host: String = Input::new()
        .with_prompt("Device address")
        .default(global.host.clone().unwrap_or_else(|| "192.168.1.20".into()))
        .interact_text()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username")
        .default(global.username.clone().unwrap_or_else(|| "ubnt".into()))
        .interact_text()
        .map_err(prompt_err)?;

    let password = prompt_password()?;
    let password = prompt_password_storage(&profile_name, password)?;

    let encoding = Select::new()
        .with_prompt("Login encoding")
        .items(&["form (airOS 8 default)", "json"])
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let verify_tls = Confirm::new()
        .with_prompt("Verify the device TLS certificate?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile::new(host);
    profile.username = username;
    profile.password = password;
    profile.login_encoding = if encoding == 0 {
        LoginEncoding::Form
    } else {
        LoginEncoding::Json
    };
    profile.verify_tls = verify_tls;

    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Default profile: {}", cfg.default_profile_name());
    eprintln!("\n  Test it: airos --profile {profile_name} status");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_toml, |c| {
                c.default_profile_name().to_owned()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: airos config init");
                return Ok(());
            }
            let default = cfg.default_profile_name();
            let mut names: Vec<_> = cfg.profiles.keys().collect();
            names.sort();
            for name in names {
                let marker = if name == default { " *" } else { "" };
                println!("{name}{marker}\t{}", cfg.profiles[name].host);
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            profile_or_err(&cfg, &name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            profile_or_err(&cfg, &profile_name)?;

            let password = prompt_password()?;
            airos_config::store_password(&profile_name, &password)?;
            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
