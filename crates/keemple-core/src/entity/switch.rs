// Switch entity: one per single switch or per channel of a dual switch.

use serde::Serialize;

use super::DeviceInfo;
use crate::model::{DeviceDescriptor, DeviceState, Reading};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchEntity {
    pub unique_id: String,
    pub name: String,
    pub is_on: bool,
    pub available: bool,
    pub device_info: DeviceInfo,
}

impl SwitchEntity {
    pub fn new(descriptor: &DeviceDescriptor, state: Option<&DeviceState>) -> Self {
        let is_on = matches!(state.map(|s| &s.reading), Some(Reading::Switch { on: true }));
        Self {
            unique_id: descriptor.unique_id(),
            name: descriptor.display_name(),
            is_on,
            available: state.is_some_and(DeviceState::is_available),
            device_info: DeviceInfo::from(descriptor),
        }
    }
}
