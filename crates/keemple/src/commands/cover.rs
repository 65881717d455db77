//! Blind command handlers.
//!
//! Positions are given in host units (0 closed, 100 open); the core
//! converts them to the device range when sending.

use keemple_core::{CoverEntity, DeviceCommand, DeviceKind, Hub};

use crate::cli::{CoverArgs, CoverCommand, GlobalOpts};
use crate::error::CliError;

use super::util;

pub async fn handle(hub: &Hub, args: CoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (device, command) = match args.command {
        CoverCommand::Open { device } => (device, DeviceCommand::Open),
        CoverCommand::Close { device } => (device, DeviceCommand::Close),
        CoverCommand::Stop { device } => (device, DeviceCommand::Stop),
        CoverCommand::Set { device, position } => (device, CoverEntity::position_command(position)),
    };
    let descriptor = util::resolve_kind(hub, &device, DeviceKind::Blind, &command)?;
    util::execute_and_show(hub, &descriptor, command, global).await
}
