//! Shared helpers for command handlers.

use std::sync::Arc;

use keemple_core::{DeviceCommand, DeviceDescriptor, DeviceKind, Entity, Hub};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Resolve a device by id, unique id, or name (case-insensitive).
///
/// Ids win over names. A name shared by several devices is rejected.
pub fn resolve_device(hub: &Hub, identifier: &str) -> Result<Arc<DeviceDescriptor>, CliError> {
    let snap = hub.devices_snapshot();
    let needle = identifier.trim();

    if let Some(d) = snap
        .iter()
        .find(|d| d.device_id.as_str() == needle || d.unique_id() == needle)
    {
        return Ok(Arc::clone(d));
    }

    let named: Vec<_> = snap
        .iter()
        .filter(|d| {
            d.display_name().eq_ignore_ascii_case(needle) || d.name.eq_ignore_ascii_case(needle)
        })
        .collect();

    match named.as_slice() {
        [] => Err(CliError::NotFound {
            identifier: identifier.into(),
        }),
        [one] => Ok(Arc::clone(*one)),
        many => Err(CliError::Validation {
            field: "device".into(),
            reason: format!(
                "'{identifier}' matches {} devices ({}); use an id",
                many.len(),
                many.iter()
                    .map(|d| d.device_id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}

/// Resolve a device and check it is of `kind` before sending anything.
pub fn resolve_kind(
    hub: &Hub,
    identifier: &str,
    kind: DeviceKind,
    command: &DeviceCommand,
) -> Result<Arc<DeviceDescriptor>, CliError> {
    let device = resolve_device(hub, identifier)?;
    if device.kind != kind {
        return Err(CliError::Unsupported {
            operation: command.name().into(),
            kind: device.kind.to_string(),
        });
    }
    Ok(device)
}

/// Send `command`, then print the device's entity view.
pub async fn execute_and_show(
    hub: &Hub,
    device: &DeviceDescriptor,
    command: DeviceCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    hub.execute(&device.device_id, command).await?;
    tracing::debug!(device = %device.device_id, command = command.name(), "command sent");

    if !global.quiet {
        eprintln!("✓ {} → {}", device.display_name(), command.name());
    }
    if let Some(entity) = hub.entity(&device.device_id) {
        let out = output::render_single(&global.output, &entity, entity_detail, |e| {
            e.unique_id().to_owned()
        });
        output::print_output(&out, global.quiet);
    }
    Ok(())
}

/// Key/value view of a host entity.
pub fn entity_detail(entity: &Entity) -> String {
    let info = entity.device_info();
    let mut lines = vec![
        format!("Unique ID:  {}", entity.unique_id()),
        format!("Name:       {}", entity.name()),
        format!("Model:      {}", info.model),
        format!("Available:  {}", entity.available()),
    ];

    match entity {
        Entity::Switch(e) => {
            lines.push(format!("State:      {}", if e.is_on { "on" } else { "off" }));
        }
        Entity::Cover(e) => {
            lines.push(format!("Position:   {}", fmt_opt(e.current_position)));
            lines.push(format!("Closed:     {}", fmt_opt(e.is_closed)));
        }
        Entity::Climate(e) => {
            lines.push(format!("Mode:       {}", e.hvac_mode));
            lines.push(format!("Action:     {}", fmt_opt(e.hvac_action)));
            lines.push(format!(
                "Current:    {}",
                fmt_opt(e.current_temperature.map(|t| format!("{t:.1} °C")))
            ));
            lines.push(format!(
                "Target:     {}",
                fmt_opt(e.target_temperature.map(|t| format!("{t:.1} °C")))
            ));
            lines.push(format!("Range:      {}-{} °C", e.min_temp, e.max_temp));
            if let Some(battery) = e.battery_level {
                lines.push(format!("Battery:    {battery}%"));
            }
        }
    }
    lines.join("\n")
}

pub fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
