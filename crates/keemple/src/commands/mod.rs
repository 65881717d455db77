//! Command dispatch: bridges CLI args -> hub operations -> output formatting.

pub mod climate;
pub mod config_cmd;
pub mod cover;
pub mod devices;
pub mod login;
pub mod switch;
pub mod util;
pub mod watch;

use std::time::Duration;

use keemple_core::{Hub, HubConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a cloud-bound command to the appropriate handler.
///
/// Everything except `watch` runs against a single poll cycle: connect,
/// act, disconnect.
pub async fn dispatch(
    cmd: Command,
    mut config: HubConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Watch(args) = cmd {
        return watch::handle(config, args, global).await;
    }

    config.poll_interval = Duration::ZERO;
    let hub = Hub::new(config);
    hub.connect().await?;

    let result = match cmd {
        Command::Login => login::handle(&hub, global),
        Command::Devices(args) => devices::handle(&hub, args, global),
        Command::Switch(args) => switch::handle(&hub, args, global).await,
        Command::Cover(args) => cover::handle(&hub, args, global).await,
        Command::Climate(args) => climate::handle(&hub, args, global).await,
        // Handled before the hub exists
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Err(
            CliError::Internal("command dispatched to the wrong handler".into()),
        ),
    };

    hub.disconnect().await;
    result
}
