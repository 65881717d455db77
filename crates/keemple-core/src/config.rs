// ── Runtime hub configuration ──
//
// These types describe *how* to reach the Keemple cloud and how the sync
// engine behaves. They carry credential data and tuning, but never touch
// disk. The CLI constructs a `HubConfig` and hands it in.

use std::time::Duration;

use keemple_api::{Credentials, DEFAULT_BASE_URL, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::model::DeviceKind;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default for the public cloud endpoint.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (intercepting proxies only).
    DangerAcceptInvalid,
}

// ── Device type table ────────────────────────────────────────────────

/// How a Keemple `devicetype` code maps onto a device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Single-channel switch.
    Switch,
    /// Two-channel switch, expanded into one device per channel.
    DualSwitch,
    Blind,
    Thermostat,
}

impl Classification {
    pub fn kind(self) -> DeviceKind {
        match self {
            Self::Switch | Self::DualSwitch => DeviceKind::Switch,
            Self::Blind => DeviceKind::Blind,
            Self::Thermostat => DeviceKind::Thermostat,
        }
    }

    /// Channels a device of this class exposes; empty for single devices.
    pub fn channels(self) -> &'static [u8] {
        match self {
            Self::DualSwitch => &DUAL_CHANNELS,
            _ => &[],
        }
    }
}

/// Channel numbers of a dual-channel switch.
pub const DUAL_CHANNELS: [u8; 2] = [1, 2];

/// Type code → device kind table. Overridable per profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTypeTable {
    pub switch: Vec<String>,
    pub dual_switch: Vec<String>,
    pub blind: Vec<String>,
    pub thermostat: Vec<String>,
}

impl Default for DeviceTypeTable {
    fn default() -> Self {
        Self {
            switch: vec!["41".into()],
            dual_switch: vec!["42".into()],
            blind: vec!["43".into()],
            thermostat: vec!["44".into()],
        }
    }
}

impl DeviceTypeTable {
    /// Classify a type code. `None` means the code is not supported.
    pub fn classify(&self, type_code: &str) -> Option<Classification> {
        let code = type_code.trim();
        let has = |list: &[String]| list.iter().any(|c| c == code);

        if has(&self.dual_switch) {
            Some(Classification::DualSwitch)
        } else if has(&self.switch) {
            Some(Classification::Switch)
        } else if has(&self.blind) {
            Some(Classification::Blind)
        } else if has(&self.thermostat) {
            Some(Classification::Thermostat)
        } else {
            None
        }
    }
}

// ── HubConfig ────────────────────────────────────────────────────────

/// Configuration for one Keemple account.
///
/// Built by the CLI, passed to [`Hub`](crate::Hub); core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// API base URL (e.g. `https://webconsole.keemple.com/iremote`).
    pub base_url: String,
    /// Account credentials.
    pub credentials: Credentials,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How often the sync engine polls. Zero disables background polling.
    pub poll_interval: Duration,
    /// Consecutive failed polls before a device is marked stale.
    pub stale_after: u32,
    /// Delay before re-reading a device after a command. Zero disables.
    pub refresh_delay: Duration,
    /// Session lifetime assumed when the login response carries none.
    pub session_ttl: Duration,
    /// Retry policy for transient request failures.
    pub retry: RetryPolicy,
    /// Device type classification table.
    pub device_types: DeviceTypeTable,
}

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default number of failed polls before a device is considered stale.
pub const DEFAULT_STALE_AFTER: u32 = 3;

impl HubConfig {
    /// Configuration with defaults for everything but the credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            credentials,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            stale_after: DEFAULT_STALE_AFTER,
            refresh_delay: Duration::ZERO,
            session_ttl: Duration::from_secs(30 * 60),
            retry: RetryPolicy::default(),
            device_types: DeviceTypeTable::default(),
        }
    }
}
