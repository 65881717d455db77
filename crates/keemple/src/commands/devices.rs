//! Device listing and inspection.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use keemple_core::convert::keemple_to_host_position;
use keemple_core::{
    Availability, DeviceDescriptor, DeviceId, DeviceKind, DeviceState, Hub, Reading,
};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, KindFilter};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

/// A device joined with its cached state, as emitted by `devices list`.
#[derive(Debug, Serialize)]
struct DeviceView {
    id: DeviceId,
    unique_id: String,
    name: String,
    kind: DeviceKind,
    type_code: String,
    room: Option<String>,
    availability: Option<Availability>,
    battery: Option<u8>,
    reading: Option<Reading>,
}

impl DeviceView {
    fn new(d: &DeviceDescriptor, state: Option<&DeviceState>) -> Self {
        Self {
            id: d.device_id.clone(),
            unique_id: d.unique_id(),
            name: d.display_name(),
            kind: d.kind,
            type_code: d.type_code.clone(),
            room: d.room.clone(),
            availability: state.map(|s| s.availability),
            battery: state.and_then(|s| s.battery),
            reading: state.map(|s| s.reading.clone()),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Availability")]
    availability: String,
}

fn row(v: &DeviceView, color: bool) -> DeviceRow {
    DeviceRow {
        id: v.id.to_string(),
        name: v.name.clone(),
        kind: v.kind.to_string(),
        room: v.room.clone().unwrap_or_else(|| "-".into()),
        state: v.reading.as_ref().map_or_else(|| "-".into(), describe_reading),
        availability: v
            .availability
            .map_or_else(|| "-".into(), |a| output::availability(a, color)),
    }
}

/// Short human description of a reading, with blind positions in host units.
fn describe_reading(reading: &Reading) -> String {
    match reading {
        Reading::Switch { on } => String::from(if *on { "on" } else { "off" }),
        Reading::Blind { position } => format!("position {}", keemple_to_host_position(*position)),
        Reading::Thermostat {
            power_on,
            target_temperature,
            current_temperature,
        } => format!(
            "{} {} → {}",
            if *power_on { "heat" } else { "off" },
            util::fmt_opt(current_temperature.map(|t| format!("{t:.1}°"))),
            util::fmt_opt(target_temperature.map(|t| format!("{t:.1}°"))),
        ),
    }
}

#[derive(Debug, Serialize)]
struct RoomView {
    room: String,
    devices: Vec<DeviceId>,
}

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Devices")]
    count: usize,
    #[tabled(rename = "IDs")]
    ids: String,
}

impl From<&RoomView> for RoomRow {
    fn from(r: &RoomView) -> Self {
        Self {
            room: r.room.clone(),
            count: r.devices.len(),
            ids: r
                .devices
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn kind_of(filter: KindFilter) -> DeviceKind {
    match filter {
        KindFilter::Switch => DeviceKind::Switch,
        KindFilter::Blind => DeviceKind::Blind,
        KindFilter::Thermostat => DeviceKind::Thermostat,
    }
}

fn list(hub: &Hub, kind: Option<KindFilter>, room: Option<&str>) -> Vec<Arc<DeviceDescriptor>> {
    let mut devices: Vec<_> = match room {
        Some(room) => hub.devices_by_room(room),
        None => hub.devices_snapshot().iter().cloned().collect(),
    };
    if let Some(kind) = kind.map(kind_of) {
        devices.retain(|d| d.kind == kind);
    }
    devices
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(hub: &Hub, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    match args.command {
        DevicesCommand::List { kind, room } => {
            let views: Vec<DeviceView> = list(hub, kind, room.as_deref())
                .iter()
                .map(|d| DeviceView::new(d, hub.state(&d.device_id).as_deref()))
                .collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| row(v, color),
                |v| v.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let descriptor = util::resolve_device(hub, &device)?;
            let entity = hub
                .entity(&descriptor.device_id)
                .ok_or_else(|| CliError::NotFound { identifier: device })?;
            let out = output::render_single(&global.output, &entity, util::entity_detail, |e| {
                e.unique_id().to_owned()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Rooms => {
            let rooms: Vec<RoomView> = hub
                .rooms()
                .into_iter()
                .filter(|(_, devices)| !devices.is_empty())
                .map(|(room, devices)| RoomView {
                    room,
                    devices: devices.iter().map(|d| d.device_id.clone()).collect(),
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &rooms,
                |r| RoomRow::from(r),
                |r| r.room.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_describe_host_units() {
        assert_eq!(describe_reading(&Reading::Switch { on: true }), "on");
        assert_eq!(describe_reading(&Reading::Blind { position: 99 }), "position 100");
        assert_eq!(
            describe_reading(&Reading::Thermostat {
                power_on: true,
                target_temperature: Some(21.5),
                current_temperature: None,
            }),
            "heat - → 21.5°"
        );
    }
}
