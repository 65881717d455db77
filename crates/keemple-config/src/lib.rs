//! Shared configuration for Keemple tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `keemple_core::HubConfig`. The CLI adds
//! `GlobalOpts`-aware overrides on top.

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

use keemple_core::config::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_STALE_AFTER};
use keemple_core::{Credentials, DeviceTypeTable, HubConfig, TlsVerification};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "keemple";

/// Environment variables consulted during credential resolution.
pub const ENV_ACCOUNT: &str = "KEEMPLE_ACCOUNT";
pub const ENV_PASSWORD: &str = "KEEMPLE_PASSWORD";
pub const ENV_COUNTRY_CODE: &str = "KEEMPLE_COUNTRY_CODE";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
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
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
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

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
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
    30
}
fn default_country_code() -> String {
    keemple_core::DEFAULT_COUNTRY_CODE.into()
}

/// A named Keemple account profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Phone number or e-mail used in the Keemple app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Country dialing code; `"0"` when the account is an e-mail.
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Path to custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Poll interval in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,

    /// Consecutive failed polls before a device is marked stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after: Option<u32>,

    /// Seconds to wait before re-reading a device after a command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_delay: Option<u64>,

    /// Device type code overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_types: Option<DeviceTypeTable>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            account: None,
            country_code: default_country_code(),
            base_url: None,
            password: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            poll_interval: None,
            stale_after: None,
            refresh_delay: None,
            device_types: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "keemple", "keemple").map_or_else(
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
    p.push("keemple");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `KEEMPLE_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("KEEMPLE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_key(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name))
        .ok()?
        .get_password()
        .ok()
}

/// Resolve account credentials from env, keyring, and the profile.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    resolve_credentials_with(profile, profile_name, |key| std::env::var(key).ok())
}

/// [`resolve_credentials`] with an explicit environment lookup.
///
/// Account: profile, then `KEEMPLE_ACCOUNT`. Password: `KEEMPLE_PASSWORD`,
/// then the system keyring, then plaintext in the profile. Country code:
/// `KEEMPLE_COUNTRY_CODE`, then the profile.
pub fn resolve_credentials_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let no_credentials = || ConfigError::NoCredentials {
        profile: profile_name.into(),
    };

    let account = profile
        .account
        .clone()
        .filter(|a| !a.trim().is_empty())
        .or_else(|| env(ENV_ACCOUNT))
        .ok_or_else(no_credentials)?;

    let password = env(ENV_PASSWORD)
        .or_else(|| keyring_password(profile_name))
        .or_else(|| profile.password.clone())
        .ok_or_else(no_credentials)?;

    let country_code = env(ENV_COUNTRY_CODE).unwrap_or_else(|| profile.country_code.clone());

    Ok(Credentials::new(
        account,
        SecretString::from(password),
        country_code,
    ))
}

// ── Profile → HubConfig ─────────────────────────────────────────────

/// Build a `HubConfig` from a profile and resolved credentials.
///
/// Unset profile fields fall back to `HubConfig` defaults.
pub fn profile_to_hub_config(
    profile: &Profile,
    credentials: Credentials,
) -> Result<HubConfig, ConfigError> {
    let mut config = HubConfig::new(credentials);

    if let Some(ref raw) = profile.base_url {
        let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "base_url".into(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        config.base_url = raw.clone();
    }

    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    if let Some(secs) = profile.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    config.poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS));
    config.stale_after = profile.stale_after.unwrap_or(DEFAULT_STALE_AFTER);
    if config.stale_after == 0 {
        return Err(ConfigError::Validation {
            field: "stale_after".into(),
            reason: "must be at least 1".into(),
        });
    }
    if let Some(secs) = profile.refresh_delay {
        config.refresh_delay = Duration::from_secs(secs);
    }
    if let Some(ref types) = profile.device_types {
        config.device_types = types.clone();
    }

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
output = "json"

[profiles.home]
account = "user1"
password = "pw"
poll_interval = 15

[profiles.home.device_types]
blind = ["43", "47"]
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("home"));
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 30);

        let home = &cfg.profiles["home"];
        assert_eq!(home.account.as_deref(), Some("user1"));
        assert_eq!(home.country_code, "0");
        assert_eq!(home.poll_interval, Some(15));

        let types = home.device_types.as_ref().unwrap();
        assert_eq!(types.blind, vec!["43".to_owned(), "47".to_owned()]);
        assert_eq!(types.switch, vec!["41".to_owned()]);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                account: Some("user@example.com".into()),
                stale_after: Some(5),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("password"));

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["default"].stale_after, Some(5));
    }

    #[test]
    fn env_password_wins_over_plaintext() {
        let profile = Profile {
            account: Some("user1".into()),
            password: Some("plain".into()),
            ..Profile::default()
        };
        let creds = resolve_credentials_with(&profile, "test-env-wins", |key| match key {
            ENV_PASSWORD => Some("from-env".into()),
            ENV_COUNTRY_CODE => Some("380".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(creds.account_id(), "user1");
        assert_eq!(creds.password().expose_secret(), "from-env");
        assert_eq!(creds.country_code(), "380");
    }

    #[test]
    fn account_falls_back_to_env() {
        let profile = Profile {
            password: Some("pw".into()),
            ..Profile::default()
        };
        let creds = resolve_credentials_with(&profile, "test-account-env", |key| {
            (key == ENV_ACCOUNT).then(|| "env-user".to_owned())
        })
        .unwrap();
        assert_eq!(creds.account_id(), "env-user");
        assert_eq!(creds.country_code(), "0");
    }

    #[test]
    fn missing_account_is_no_credentials() {
        let err = resolve_credentials_with(&Profile::default(), "nobody", no_env).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "nobody"));
    }

    #[test]
    fn profile_maps_onto_hub_config() {
        let profile = Profile {
            base_url: Some("http://127.0.0.1:8080/iremote".into()),
            insecure: Some(true),
            timeout: Some(5),
            poll_interval: Some(0),
            refresh_delay: Some(2),
            ..Profile::default()
        };
        let creds = Credentials::new("user1", SecretString::from("pw".to_owned()), "0");

        let hub = profile_to_hub_config(&profile, creds).unwrap();
        assert_eq!(hub.base_url, "http://127.0.0.1:8080/iremote");
        assert_eq!(hub.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(hub.timeout, Duration::from_secs(5));
        assert_eq!(hub.poll_interval, Duration::ZERO);
        assert_eq!(hub.refresh_delay, Duration::from_secs(2));
        assert_eq!(hub.stale_after, DEFAULT_STALE_AFTER);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let creds = Credentials::new("user1", SecretString::from("pw".to_owned()), "0");
        let profile = Profile {
            base_url: Some("ftp://example.com".into()),
            ..Profile::default()
        };
        let err = profile_to_hub_config(&profile, creds).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "base_url"));
    }
}
