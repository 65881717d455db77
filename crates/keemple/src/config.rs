//! CLI configuration: thin wrapper around `keemple_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--account, --base-url, etc.).

use std::time::Duration;

use keemple_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use keemple_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config, store_password,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Apply flag overrides onto a copy of `profile`.
pub fn apply_overrides(profile: &Profile, global: &GlobalOpts) -> Profile {
    let mut profile = profile.clone();
    if let Some(ref account) = global.account {
        profile.account = Some(account.clone());
    }
    if let Some(ref code) = global.country_code {
        profile.country_code.clone_from(code);
    }
    if let Some(ref url) = global.base_url {
        profile.base_url = Some(url.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    profile
}

/// Translate a `Profile` + global flags into a `HubConfig`.
///
/// CLI flag overrides take priority over profile values. The timeout
/// flag only applies when the profile sets none.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<HubConfig, CliError> {
    let profile = apply_overrides(profile, global);
    let credentials = keemple_config::resolve_credentials(&profile, profile_name)?;
    let mut config = keemple_config::profile_to_hub_config(&profile, credentials)?;

    if profile.timeout.is_none() {
        config.timeout = Duration::from_secs(global.timeout);
    }
    Ok(config)
}
