// ── Device commands ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lowest settable thermostat target (°C).
pub const MIN_TEMPERATURE: f64 = 5.0;
/// Highest settable thermostat target (°C).
pub const MAX_TEMPERATURE: f64 = 35.0;
/// Target temperature granularity (°C).
pub const TEMPERATURE_STEP: f64 = 0.5;

/// Host-facing blind position range is `0..=HOST_MAX_POSITION`.
pub const HOST_MAX_POSITION: u8 = 100;

/// Thermostat operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HvacMode {
    Off,
    Heat,
}

/// A state change requested by the host.
///
/// Positions are in host units (`0..=100`); conversion to the device's
/// native range happens when the command is sent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum DeviceCommand {
    TurnOn,
    TurnOff,
    Open,
    Close,
    Stop,
    SetPosition(u8),
    SetTargetTemperature(f64),
    SetHvacMode(HvacMode),
}

impl DeviceCommand {
    /// Check argument ranges. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Self::SetPosition(p) if p > HOST_MAX_POSITION => {
                Err(format!("position {p} is outside 0..={HOST_MAX_POSITION}"))
            }
            Self::SetTargetTemperature(t)
                if !t.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&t) =>
            {
                Err(format!(
                    "temperature {t} is outside {MIN_TEMPERATURE}..={MAX_TEMPERATURE}"
                ))
            }
            _ => Ok(()),
        }
    }

    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Open => "open",
            Self::Close => "close",
            Self::Stop => "stop",
            Self::SetPosition(_) => "set_position",
            Self::SetTargetTemperature(_) => "set_target_temperature",
            Self::SetHvacMode(_) => "set_hvac_mode",
        }
    }
}

/// Snap a temperature to the nearest [`TEMPERATURE_STEP`].
pub fn snap_temperature(t: f64) -> f64 {
    (t / TEMPERATURE_STEP).round() * TEMPERATURE_STEP
}
