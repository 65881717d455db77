// Climate entity for Keemple heaters/thermostats.

use serde::Serialize;
use strum::Display;

use super::DeviceInfo;
use crate::model::command::{MAX_TEMPERATURE, MIN_TEMPERATURE, TEMPERATURE_STEP};
use crate::model::{DeviceDescriptor, DeviceState, HvacMode, Reading};

/// What the heater is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HvacAction {
    Off,
    Heating,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateEntity {
    pub unique_id: String,
    pub name: String,
    pub hvac_mode: HvacMode,
    pub hvac_modes: [HvacMode; 2],
    /// `None` when the mode is heat but a temperature is unknown.
    pub hvac_action: Option<HvacAction>,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub min_temp: f64,
    pub max_temp: f64,
    pub target_temperature_step: f64,
    pub battery_level: Option<u8>,
    pub available: bool,
    pub device_info: DeviceInfo,
}

impl ClimateEntity {
    pub fn new(descriptor: &DeviceDescriptor, state: Option<&DeviceState>) -> Self {
        let (power_on, target, current) = match state.map(|s| &s.reading) {
            Some(Reading::Thermostat {
                power_on,
                target_temperature,
                current_temperature,
            }) => (*power_on, *target_temperature, *current_temperature),
            _ => (false, None, None),
        };

        let hvac_mode = if power_on { HvacMode::Heat } else { HvacMode::Off };

        Self {
            unique_id: descriptor.unique_id(),
            name: descriptor.display_name(),
            hvac_mode,
            hvac_modes: [HvacMode::Off, HvacMode::Heat],
            hvac_action: hvac_action(hvac_mode, current, target),
            current_temperature: current,
            target_temperature: target,
            min_temp: MIN_TEMPERATURE,
            max_temp: MAX_TEMPERATURE,
            target_temperature_step: TEMPERATURE_STEP,
            battery_level: state.and_then(|s| s.battery),
            available: state.is_some_and(DeviceState::is_available),
            device_info: DeviceInfo::from(descriptor),
        }
    }
}

fn hvac_action(mode: HvacMode, current: Option<f64>, target: Option<f64>) -> Option<HvacAction> {
    if mode == HvacMode::Off {
        return Some(HvacAction::Off);
    }
    let (current, target) = (current?, target?);
    if current < target {
        Some(HvacAction::Heating)
    } else {
        Some(HvacAction::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_follows_temperatures() {
        assert_eq!(
            hvac_action(HvacMode::Heat, Some(18.0), Some(21.0)),
            Some(HvacAction::Heating)
        );
        assert_eq!(
            hvac_action(HvacMode::Heat, Some(21.0), Some(21.0)),
            Some(HvacAction::Idle)
        );
        assert_eq!(hvac_action(HvacMode::Heat, None, Some(21.0)), None);
        assert_eq!(
            hvac_action(HvacMode::Off, Some(18.0), Some(21.0)),
            Some(HvacAction::Off)
        );
    }
}
