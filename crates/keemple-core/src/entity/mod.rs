// ── Entity adapters ──
//
// Pure translation of (descriptor, cached state) into host-facing entity
// views. Adapters hold no state of their own; build a fresh view whenever
// the cache changes.

mod climate;
mod cover;
mod switch;

use serde::Serialize;

pub use climate::{ClimateEntity, HvacAction};
pub use cover::{COVER_FEATURES, CoverEntity, CoverFeature};
pub use switch::SwitchEntity;

use crate::model::device::MANUFACTURER;
use crate::model::{DeviceDescriptor, DeviceKind, DeviceState};

/// Device registry metadata attached to every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
}

impl From<&DeviceDescriptor> for DeviceInfo {
    fn from(descriptor: &DeviceDescriptor) -> Self {
        Self {
            identifier: descriptor.unique_id(),
            name: descriptor.name.clone(),
            manufacturer: MANUFACTURER,
            model: descriptor.model(),
        }
    }
}

/// A host entity, tagged by platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum Entity {
    Switch(SwitchEntity),
    Cover(CoverEntity),
    Climate(ClimateEntity),
}

impl Entity {
    /// Build the entity view for a device. `state` is `None` before the
    /// first successful read; the entity then reports unavailable.
    pub fn new(descriptor: &DeviceDescriptor, state: Option<&DeviceState>) -> Self {
        match descriptor.kind {
            DeviceKind::Switch => Self::Switch(SwitchEntity::new(descriptor, state)),
            DeviceKind::Blind => Self::Cover(CoverEntity::new(descriptor, state)),
            DeviceKind::Thermostat => Self::Climate(ClimateEntity::new(descriptor, state)),
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Switch(e) => &e.unique_id,
            Self::Cover(e) => &e.unique_id,
            Self::Climate(e) => &e.unique_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Switch(e) => &e.name,
            Self::Cover(e) => &e.name,
            Self::Climate(e) => &e.name,
        }
    }

    pub fn available(&self) -> bool {
        match self {
            Self::Switch(e) => e.available,
            Self::Cover(e) => e.available,
            Self::Climate(e) => e.available,
        }
    }

    pub fn device_info(&self) -> &DeviceInfo {
        match self {
            Self::Switch(e) => &e.device_info,
            Self::Cover(e) => &e.device_info,
            Self::Climate(e) => &e.device_info,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Availability, Capabilities, DeviceId, HvacMode, Reading};

    fn descriptor(kind: DeviceKind, type_code: &str, channel: Option<u8>) -> DeviceDescriptor {
        DeviceDescriptor {
            device_id: DeviceId::new(9, channel),
            kind,
            name: "Living".into(),
            capabilities: Capabilities::for_kind(kind),
            nuid: 9,
            zwave_device_id: 90,
            channel,
            type_code: type_code.into(),
            room: Some("Living room".into()),
        }
    }

    fn state(id: &DeviceId, reading: Reading) -> DeviceState {
        DeviceState::new(id.clone(), reading)
    }

    #[test]
    fn switch_channel_entity() {
        let d = descriptor(DeviceKind::Switch, "42", Some(1));
        let s = state(&d.device_id, Reading::Switch { on: true });

        let Entity::Switch(e) = Entity::new(&d, Some(&s)) else {
            panic!("expected switch entity");
        };
        assert!(e.is_on);
        assert!(e.available);
        assert_eq!(e.name, "Living Channel 1");
        assert_eq!(e.unique_id, "keemple_42_9_channel_1");
        assert_eq!(
            e.device_info,
            DeviceInfo {
                identifier: "keemple_42_9_channel_1".into(),
                name: "Living".into(),
                manufacturer: "Keemple",
                model: "Type 42".into(),
            }
        );
    }

    #[test]
    fn cover_scales_position() {
        let d = descriptor(DeviceKind::Blind, "43", None);

        let Entity::Cover(open) = Entity::new(&d, Some(&state(&d.device_id, Reading::Blind { position: 99 })))
        else {
            panic!("expected cover entity");
        };
        assert_eq!(open.current_position, Some(100));
        assert_eq!(open.is_closed, Some(false));
        assert_eq!(open.supported_features.len(), 4);

        let Entity::Cover(closed) = Entity::new(&d, Some(&state(&d.device_id, Reading::Blind { position: 0 })))
        else {
            panic!("expected cover entity");
        };
        assert_eq!(closed.current_position, Some(0));
        assert_eq!(closed.is_closed, Some(true));
    }

    #[test]
    fn climate_entity_reports_heating() {
        let d = descriptor(DeviceKind::Thermostat, "44", None);
        let mut s = state(
            &d.device_id,
            Reading::Thermostat {
                power_on: true,
                target_temperature: Some(22.0),
                current_temperature: Some(19.0),
            },
        );
        s.battery = Some(80);

        let Entity::Climate(e) = Entity::new(&d, Some(&s)) else {
            panic!("expected climate entity");
        };
        assert_eq!(e.hvac_mode, HvacMode::Heat);
        assert_eq!(e.hvac_action, Some(HvacAction::Heating));
        assert_eq!(e.battery_level, Some(80));
        assert!((e.min_temp - 5.0).abs() < f64::EPSILON);
        assert!((e.max_temp - 35.0).abs() < f64::EPSILON);
        assert!((e.target_temperature_step - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unavailable_state_and_missing_state() {
        let d = descriptor(DeviceKind::Switch, "41", None);
        let mut s = state(&d.device_id, Reading::Switch { on: true });
        s.availability = Availability::Unavailable;
        assert!(!Entity::new(&d, Some(&s)).available());

        s.availability = Availability::Stale;
        assert!(Entity::new(&d, Some(&s)).available());

        let missing = Entity::new(&d, None);
        assert!(!missing.available());
        assert_eq!(missing.name(), "Living");
    }

    #[test]
    fn entity_serializes_with_platform_tag() {
        let d = descriptor(DeviceKind::Switch, "41", None);
        let json = serde_json::to_value(Entity::new(&d, None)).unwrap();
        assert_eq!(json["platform"], "switch");
        assert_eq!(json["device_info"]["manufacturer"], "Keemple");
    }
}
