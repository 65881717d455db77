//! `keemple login`: authenticate, sync once, and report what was found.

use keemple_core::{DeviceKind, Hub};

use crate::cli::GlobalOpts;
use crate::error::CliError;

#[allow(clippy::unnecessary_wraps)]
pub fn handle(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    if global.quiet {
        return Ok(());
    }
    let count = |kind| hub.devices_by_kind(kind).len();
    eprintln!(
        "✓ Logged in as {}",
        hub.config().credentials.account_id()
    );
    eprintln!(
        "  {} switches, {} blinds, {} heaters",
        count(DeviceKind::Switch),
        count(DeviceKind::Blind),
        count(DeviceKind::Thermostat),
    );
    Ok(())
}
