// ── Device identity ──
//
// A DeviceId names one controllable unit: a whole appliance, or a single
// channel of a dual-channel switch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a device within the registry.
///
/// `"{nuid}"` for single devices, `"{nuid}_{channel}"` for each channel
/// of a multi-channel appliance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(nuid: i64, channel: Option<u8>) -> Self {
        match channel {
            Some(ch) => Self(format!("{nuid}_{ch}")),
            None => Self(nuid.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The appliance `nuid` this id belongs to, if it parses.
    pub fn nuid(&self) -> Option<i64> {
        self.0.split('_').next()?.parse().ok()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_owned()))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
