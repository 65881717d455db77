//! Config subcommand handlers.

use std::path::PathBuf;

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, p)| {
            let mut p = p.clone();
            if p.password.is_some() {
                p.password = Some(MASK.into());
            }
            (name.clone(), p)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: config::Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

/// Format config for display. Expects an already redacted config.
fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CliError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| CliError::Validation {
        field: key.into(),
        reason: format!("{e}"),
    })
}

/// Apply `key = value` to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "account" => profile.account = Some(value),
        "country_code" | "country-code" => {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
                return Err(CliError::Validation {
                    field: "country_code".into(),
                    reason: "must be digits only (\"0\" for e-mail accounts)".into(),
                });
            }
            profile.country_code = value;
        }
        "base_url" | "base-url" => profile.base_url = Some(value),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(PathBuf::from(value)),
        "insecure" => profile.insecure = Some(parse_value(key, &value)?),
        "timeout" => profile.timeout = Some(parse_value(key, &value)?),
        "poll_interval" | "poll-interval" => profile.poll_interval = Some(parse_value(key, &value)?),
        "stale_after" | "stale-after" => {
            let n: u32 = parse_value(key, &value)?;
            if n == 0 {
                return Err(CliError::Validation {
                    field: "stale_after".into(),
                    reason: "must be at least 1".into(),
                });
            }
            profile.stale_after = Some(n);
        }
        "refresh_delay" | "refresh-delay" => profile.refresh_delay = Some(parse_value(key, &value)?),
        "password" => {
            return Err(CliError::Validation {
                field: "password".into(),
                reason: "use `keemple config set-password` to store it in the keyring".into(),
            });
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: "unknown key (account, country_code, base_url, ca_cert, insecure, \
                         timeout, poll_interval, stale_after, refresh_delay)"
                    .into(),
            });
        }
    }
    Ok(())
}

/// Offer to store the password in the system keyring or return it for
/// plaintext config. `None` means it went to the keyring.
fn prompt_password_storage(profile_name: &str, password: &str) -> Result<Option<String>, CliError> {
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
        config::store_password(profile_name, password)?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password.to_owned()))
    }
}

fn read_password() -> Result<String, CliError> {
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(password)
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("Keemple CLI configuration");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let account: String = Input::new()
                .with_prompt("Account (phone number or e-mail)")
                .interact_text()
                .map_err(prompt_err)?;

            let default_code = if account.contains('@') { "0" } else { "" };
            let country_code: String = Input::new()
                .with_prompt("Country code (0 for e-mail)")
                .default(default_code.into())
                .interact_text()
                .map_err(prompt_err)?;

            let password = read_password()?;
            let password = prompt_password_storage(&profile_name, &password)?;

            let mut profile = Profile {
                account: Some(account),
                password,
                ..Profile::default()
            };
            set_key(&mut profile, "country_code", country_code)?;

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: keemple login");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_key(profile, &key, value)?;
            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: keemple config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
                available.sort();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                });
            }

            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── Set-password ───────────────────────────────────────────
        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let password = read_password()?;
            config::store_password(&profile_name, &password)?;
            eprintln!("✓ Password for '{profile_name}' stored in system keyring");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_key_parses_typed_values() {
        let mut p = Profile::default();
        set_key(&mut p, "poll-interval", "15".into()).unwrap();
        set_key(&mut p, "insecure", "true".into()).unwrap();
        set_key(&mut p, "country_code", "380".into()).unwrap();
        assert_eq!(p.poll_interval, Some(15));
        assert_eq!(p.insecure, Some(true));
        assert_eq!(p.country_code, "380");
    }

    #[test]
    fn set_key_rejects_bad_input() {
        let mut p = Profile::default();
        assert!(set_key(&mut p, "stale_after", "0".into()).is_err());
        assert!(set_key(&mut p, "timeout", "soon".into()).is_err());
        assert!(set_key(&mut p, "country_code", "+1".into()).is_err());
        assert!(set_key(&mut p, "password", "hunter2".into()).is_err());
        assert!(set_key(&mut p, "colour", "red".into()).is_err());
    }

    #[test]
    fn show_masks_plaintext_passwords() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                account: Some("user1".into()),
                password: Some("hunter2".into()),
                ..Profile::default()
            },
        );
        let text = format_config(&redacted(&cfg));
        assert!(text.contains(MASK));
        assert!(!text.contains("hunter2"));
        assert!(text.contains("user1"));
    }
}
