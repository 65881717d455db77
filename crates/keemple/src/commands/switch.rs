//! Switch command handlers.

use keemple_core::{DeviceCommand, DeviceKind, Hub};

use crate::cli::{GlobalOpts, SwitchArgs, SwitchCommand};
use crate::error::CliError;

use super::util;

pub async fn handle(hub: &Hub, args: SwitchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (device, command) = match args.command {
        SwitchCommand::On { device } => (device, DeviceCommand::TurnOn),
        SwitchCommand::Off { device } => (device, DeviceCommand::TurnOff),
    };
    let descriptor = util::resolve_kind(hub, &device, DeviceKind::Switch, &command)?;
    util::execute_and_show(hub, &descriptor, command, global).await
}
