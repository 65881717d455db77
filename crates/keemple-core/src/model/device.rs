// ── Device descriptor types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::command::DeviceCommand;
use super::device_id::DeviceId;

/// Prefix of host-facing unique ids.
pub const UNIQUE_ID_PREFIX: &str = "keemple";

/// Manufacturer reported in device info.
pub const MANUFACTURER: &str = "Keemple";

/// Canonical device kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceKind {
    Switch,
    Blind,
    Thermostat,
}

/// What a device can do. Derived from its kind at registry sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub on_off: bool,
    pub open_close: bool,
    pub stop: bool,
    pub set_position: bool,
    pub target_temperature: bool,
    pub hvac_mode: bool,
}

impl Capabilities {
    pub fn for_kind(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Switch => Self {
                on_off: true,
                ..Self::default()
            },
            DeviceKind::Blind => Self {
                open_close: true,
                stop: true,
                set_position: true,
                ..Self::default()
            },
            DeviceKind::Thermostat => Self {
                target_temperature: true,
                hvac_mode: true,
                ..Self::default()
            },
        }
    }

    /// Whether `command` is applicable to a device with these capabilities.
    pub fn supports(&self, command: &DeviceCommand) -> bool {
        match command {
            DeviceCommand::TurnOn | DeviceCommand::TurnOff => self.on_off,
            DeviceCommand::Open | DeviceCommand::Close => self.open_close,
            DeviceCommand::Stop => self.stop,
            DeviceCommand::SetPosition(_) => self.set_position,
            DeviceCommand::SetTargetTemperature(_) => self.target_temperature,
            DeviceCommand::SetHvacMode(_) => self.hvac_mode,
        }
    }
}

/// Static identity and capability record for one device.
///
/// Identity fields never change after creation; `name` and `room` follow
/// the account's latest listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device_id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
    pub capabilities: Capabilities,
    pub nuid: i64,
    pub zwave_device_id: i64,
    pub channel: Option<u8>,
    pub type_code: String,
    pub room: Option<String>,
}

impl DeviceDescriptor {
    /// Stable host-facing id: `keemple_{type}_{nuid}[_channel_{n}]`.
    pub fn unique_id(&self) -> String {
        let base = format!("{UNIQUE_ID_PREFIX}_{}_{}", self.type_code, self.nuid);
        match self.channel {
            Some(ch) => format!("{base}_channel_{ch}"),
            None => base,
        }
    }

    /// Name including the channel suffix for multi-channel devices.
    pub fn display_name(&self) -> String {
        match self.channel {
            Some(ch) => format!("{} Channel {ch}", self.name),
            None => self.name.clone(),
        }
    }

    /// Model string reported in device info.
    pub fn model(&self) -> String {
        format!("Type {}", self.type_code)
    }
}
