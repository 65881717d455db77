//! `keemple watch`: keep polling and print changes until interrupted.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use keemple_core::config::DEFAULT_POLL_INTERVAL_SECS;
use keemple_core::{
    Availability, ConnectionState, DeviceId, Hub, HubConfig, Reading, RegistryDiff, StateChange,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// One line of `watch` output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent {
    Updated {
        device_id: DeviceId,
        availability: Availability,
        reading: Reading,
    },
    Removed {
        device_id: DeviceId,
    },
    Added {
        device_id: DeviceId,
    },
    Renamed {
        device_id: DeviceId,
        from: String,
        to: String,
    },
}

impl From<&StateChange> for WatchEvent {
    fn from(change: &StateChange) -> Self {
        match change {
            StateChange::Updated { current, .. } => Self::Updated {
                device_id: current.device_id.clone(),
                availability: current.availability,
                reading: current.reading.clone(),
            },
            StateChange::Removed { device_id } => Self::Removed {
                device_id: device_id.clone(),
            },
        }
    }
}

fn registry_events(diff: &RegistryDiff) -> Vec<WatchEvent> {
    let added = diff.added.iter().map(|id| WatchEvent::Added {
        device_id: id.clone(),
    });
    let renamed = diff.renamed.iter().map(|r| WatchEvent::Renamed {
        device_id: r.device_id.clone(),
        from: r.from.clone(),
        to: r.to.clone(),
    });
    added.chain(renamed).collect()
}

fn render(event: &WatchEvent, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => match event {
            WatchEvent::Updated {
                device_id,
                availability,
                reading,
            } => format!(
                "{device_id:<10} {:<12} {}",
                output::availability(*availability, color),
                output::render_json(reading, true)
            ),
            WatchEvent::Removed { device_id } => format!("{device_id:<10} removed"),
            WatchEvent::Added { device_id } => format!("{device_id:<10} added"),
            WatchEvent::Renamed { device_id, from, to } => {
                format!("{device_id:<10} renamed '{from}' → '{to}'")
            }
        },
        // One document per line so the stream stays parseable.
        _ => output::render_json(event, true),
    }
}

pub async fn handle(
    mut config: HubConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.interval {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        config.poll_interval = Duration::from_secs(secs);
    }
    if config.poll_interval.is_zero() {
        config.poll_interval = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);
    }

    let color = output::should_color(&global.color);
    let hub = Hub::new(config);

    // Subscribe before connecting so the initial sync is reported too.
    let mut states = hub.state_changes();
    let mut registry = hub.registry_changes();
    let mut connection = hub.connection_state();

    hub.connect().await?;
    if !global.quiet {
        eprintln!(
            "Watching {} devices every {}s (Ctrl-C to stop)",
            hub.registry().len(),
            hub.config().poll_interval.as_secs()
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),

            change = states.recv() => match change {
                Ok(change) => {
                    let line = render(&WatchEvent::from(&change), &global.output, color);
                    output::print_output(&line, global.quiet);
                }
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "watch output fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },

            diff = registry.recv() => match diff {
                Ok(diff) => {
                    for event in registry_events(&diff) {
                        output::print_output(&render(&event, &global.output, color), global.quiet);
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "watch output fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },

            changed = connection.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = connection.borrow_and_update().clone();
                tracing::debug!(?state, "connection state changed");
                if state == ConnectionState::Failed {
                    break Err(CliError::Unavailable {
                        reason: "connection to the Keemple cloud failed".into(),
                    });
                }
            }
        }
    };

    hub.disconnect().await;
    result
}
