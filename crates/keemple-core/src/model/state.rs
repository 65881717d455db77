// ── Cached device state ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::device::DeviceKind;
use super::device_id::DeviceId;

/// Kind-specific reading of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reading {
    Switch {
        on: bool,
    },
    /// Native Keemple position, `0..=99`.
    Blind {
        position: u8,
    },
    Thermostat {
        power_on: bool,
        target_temperature: Option<f64>,
        current_temperature: Option<f64>,
    },
}

impl Reading {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Switch { .. } => DeviceKind::Switch,
            Self::Blind { .. } => DeviceKind::Blind,
            Self::Thermostat { .. } => DeviceKind::Thermostat,
        }
    }
}

/// Freshness of a cached reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Availability {
    /// Last poll succeeded.
    Available,
    /// Several consecutive polls failed; the reading may be outdated.
    Stale,
    /// The device could not be reached at all.
    Unavailable,
}

/// Cached state of one device. Written only by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: DeviceId,
    pub reading: Reading,
    pub battery: Option<u8>,
    pub availability: Availability,
    pub consecutive_failures: u32,
    /// Last time the cached value changed.
    pub last_updated: DateTime<Utc>,
    /// Last activity reported by the cloud, verbatim.
    pub last_active: Option<String>,
}

impl DeviceState {
    pub fn new(device_id: DeviceId, reading: Reading) -> Self {
        Self {
            device_id,
            reading,
            battery: None,
            availability: Availability::Available,
            consecutive_failures: 0,
            last_updated: Utc::now(),
            last_active: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability != Availability::Unavailable
    }

    /// Whether `other` differs in anything a subscriber should hear about.
    pub fn differs_observably(&self, other: &Self) -> bool {
        self.reading != other.reading
            || self.availability != other.availability
            || self.battery != other.battery
    }
}

/// Notification emitted by the state cache.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// A device's reading or availability changed (or it appeared).
    Updated {
        previous: Option<Arc<DeviceState>>,
        current: Arc<DeviceState>,
    },
    /// A device left the account; its state is gone.
    Removed { device_id: DeviceId },
}

impl StateChange {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Updated { current, .. } => &current.device_id,
            Self::Removed { device_id } => device_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_serializes_with_kind_tag() {
        let json = serde_json::to_value(Reading::Blind { position: 40 }).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({ "kind": "blind", "position": 40 }))
        );
    }

    #[test]
    fn counter_only_change_is_not_observable() {
        let a = DeviceState::new(DeviceId::from("1"), Reading::Switch { on: true });
        let mut b = a.clone();
        b.consecutive_failures = 2;
        assert!(!a.differs_observably(&b));
        b.availability = Availability::Stale;
        assert!(a.differs_observably(&b));
    }
}
