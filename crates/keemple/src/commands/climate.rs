//! Heater command handlers.

use keemple_core::{DeviceCommand, DeviceKind, Hub, HvacMode};

use crate::cli::{ClimateArgs, ClimateCommand, GlobalOpts, ModeArg};
use crate::error::CliError;

use super::util;

pub async fn handle(hub: &Hub, args: ClimateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (device, command) = match args.command {
        ClimateCommand::SetTemp {
            device,
            temperature,
        } => (device, DeviceCommand::SetTargetTemperature(temperature)),
        ClimateCommand::Mode { device, mode } => {
            let mode = match mode {
                ModeArg::Off => HvacMode::Off,
                ModeArg::Heat => HvacMode::Heat,
            };
            (device, DeviceCommand::SetHvacMode(mode))
        }
    };

    command.validate().map_err(|reason| CliError::Validation {
        field: "temperature".into(),
        reason,
    })?;

    let descriptor = util::resolve_kind(hub, &device, DeviceKind::Thermostat, &command)?;
    util::execute_and_show(hub, &descriptor, command, global).await
}
