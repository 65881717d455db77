// Cover entity for Keemple blinds.
//
// Keemple reports positions as 0..=99; the host expects 0..=100.

use serde::Serialize;
use strum::Display;

use super::DeviceInfo;
use crate::convert::keemple_to_host_position;
use crate::model::{DeviceCommand, DeviceDescriptor, DeviceState, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoverFeature {
    Open,
    Close,
    Stop,
    SetPosition,
}

pub const COVER_FEATURES: [CoverFeature; 4] = [
    CoverFeature::Open,
    CoverFeature::Close,
    CoverFeature::Stop,
    CoverFeature::SetPosition,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverEntity {
    pub unique_id: String,
    pub name: String,
    /// Host position, `0..=100`. `None` until the first reading.
    pub current_position: Option<u8>,
    pub is_closed: Option<bool>,
    pub supported_features: Vec<CoverFeature>,
    pub available: bool,
    pub device_info: DeviceInfo,
}

impl CoverEntity {
    pub fn new(descriptor: &DeviceDescriptor, state: Option<&DeviceState>) -> Self {
        let native = match state.map(|s| &s.reading) {
            Some(Reading::Blind { position }) => Some(*position),
            _ => None,
        };
        Self {
            unique_id: descriptor.unique_id(),
            name: descriptor.display_name(),
            current_position: native.map(keemple_to_host_position),
            is_closed: native.map(|p| p == 0),
            supported_features: COVER_FEATURES.to_vec(),
            available: state.is_some_and(DeviceState::is_available),
            device_info: DeviceInfo::from(descriptor),
        }
    }

    /// Command moving the cover to a host position.
    pub fn position_command(position: u8) -> DeviceCommand {
        DeviceCommand::SetPosition(position)
    }
}
