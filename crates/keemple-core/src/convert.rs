// ── API-to-domain type conversions ──
//
// Bridges raw `keemple_api` wire types into canonical domain types and
// back: device classification, channel expansion, reading extraction,
// command payloads, and blind position scaling.

use keemple_api::{ApplianceStatus, OperateCommand, Operation, RemoteDevice};
use tracing::debug;

use crate::config::DeviceTypeTable;
use crate::error::CoreError;
use crate::model::command::{HOST_MAX_POSITION, snap_temperature};
use crate::model::{
    Capabilities, DeviceCommand, DeviceDescriptor, DeviceId, DeviceKind, HvacMode, Reading,
};

/// Highest native blind position (fully open).
pub const BLIND_MAX_POSITION: u8 = 99;

/// Thermostat `statuses` layout: power flag, target, current temperature.
pub const THERMOSTAT_POWER_IDX: usize = 0;
pub const THERMOSTAT_TARGET_IDX: usize = 1;
pub const THERMOSTAT_CURRENT_IDX: usize = 2;

const POWER_ON: u8 = 255;
const POWER_OFF: u8 = 0;
const HEATING_SETPOINT_MODE: u8 = 1;

// ── Classification ───────────────────────────────────────────────────

/// Classify remote devices into descriptors, expanding multi-channel
/// appliances. Unknown type codes are skipped.
pub fn descriptors(devices: &[RemoteDevice], table: &DeviceTypeTable) -> Vec<DeviceDescriptor> {
    let mut out = Vec::with_capacity(devices.len());

    for device in devices {
        let status = &device.status;
        let Some(class) = table.classify(&status.devicetype) else {
            debug!(
                nuid = status.nuid,
                type_code = %status.devicetype,
                "skipping unsupported device type"
            );
            continue;
        };

        let kind = class.kind();
        let make = |channel: Option<u8>| DeviceDescriptor {
            device_id: DeviceId::new(status.nuid, channel),
            kind,
            name: device.name.clone(),
            capabilities: Capabilities::for_kind(kind),
            nuid: status.nuid,
            zwave_device_id: status.zwavedeviceid,
            channel,
            type_code: status.devicetype.trim().to_owned(),
            room: device.room.clone(),
        };

        let channels = class.channels();
        if channels.is_empty() {
            out.push(make(None));
        } else {
            out.extend(channels.iter().map(|&ch| make(Some(ch))));
        }
    }

    out
}

// ── Readings ─────────────────────────────────────────────────────────

/// Extract the reading for `descriptor` from an appliance status.
pub fn reading(descriptor: &DeviceDescriptor, status: &ApplianceStatus) -> Reading {
    match descriptor.kind {
        DeviceKind::Switch => {
            let on = match descriptor.channel {
                Some(ch) => channel_value(&status.statuses, ch).is_some_and(|v| v != 0.0),
                // Z-Wave binary switches report 255 for on, so any non-zero
                // value counts.
                None => status.status != 0,
            };
            Reading::Switch { on }
        }
        DeviceKind::Blind => Reading::Blind {
            position: clamp_position(status.status),
        },
        DeviceKind::Thermostat => Reading::Thermostat {
            power_on: status_value(&status.statuses, THERMOSTAT_POWER_IDX)
                .is_some_and(|v| v != 0.0),
            target_temperature: status_value(&status.statuses, THERMOSTAT_TARGET_IDX),
            current_temperature: status_value(&status.statuses, THERMOSTAT_CURRENT_IDX),
        },
    }
}

/// Battery percentage, if reported and sane.
pub fn battery(status: &ApplianceStatus) -> Option<u8> {
    status
        .battery
        .and_then(|b| u8::try_from(b.clamp(0, 100)).ok())
}

fn channel_value(statuses: &[f64], channel: u8) -> Option<f64> {
    let idx = usize::from(channel).checked_sub(1)?;
    status_value(statuses, idx)
}

/// A `statuses` slot, treating unparseable (NaN) placeholders as absent.
fn status_value(statuses: &[f64], idx: usize) -> Option<f64> {
    statuses.get(idx).copied().filter(|v| v.is_finite())
}

fn clamp_position(raw: i64) -> u8 {
    u8::try_from(raw.clamp(0, i64::from(BLIND_MAX_POSITION))).unwrap_or(BLIND_MAX_POSITION)
}

// ── Position scaling ─────────────────────────────────────────────────

/// Native `0..=99` → host `0..=100`. Anything at or above 99 is 100.
pub fn keemple_to_host_position(position: u8) -> u8 {
    if position >= BLIND_MAX_POSITION {
        return HOST_MAX_POSITION;
    }
    // round(p * 100 / 99)
    let scaled = (u32::from(position) * 200 + 99) / 198;
    u8::try_from(scaled).unwrap_or(HOST_MAX_POSITION)
}

/// Host `0..=100` → native `0..=99`. Anything at or above 100 is 99.
pub fn host_to_keemple_position(position: u8) -> u8 {
    if position >= HOST_MAX_POSITION {
        return BLIND_MAX_POSITION;
    }
    // round(p * 99 / 100)
    let scaled = (u32::from(position) * 198 + 100) / 200;
    u8::try_from(scaled).unwrap_or(BLIND_MAX_POSITION)
}

// ── Commands ─────────────────────────────────────────────────────────

/// Build the `/device/operate` payload for a command.
pub fn operate_command(
    descriptor: &DeviceDescriptor,
    command: &DeviceCommand,
) -> Result<OperateCommand, CoreError> {
    if !descriptor.capabilities.supports(command) {
        return Err(CoreError::Unsupported {
            operation: command.name().into(),
            kind: descriptor.kind.to_string(),
        });
    }
    command
        .validate()
        .map_err(|message| CoreError::ValidationFailed { message })?;

    let op = |operation, value| OperateCommand::Operation { operation, value };

    Ok(match *command {
        DeviceCommand::TurnOn | DeviceCommand::Open => op(Operation::Open, None),
        DeviceCommand::TurnOff | DeviceCommand::Close => op(Operation::Close, None),
        DeviceCommand::Stop => op(Operation::Stop, None),
        DeviceCommand::SetPosition(p) => op(
            Operation::Open,
            Some(i64::from(host_to_keemple_position(p))),
        ),
        DeviceCommand::SetTargetTemperature(t) => OperateCommand::Temperature {
            mode: HEATING_SETPOINT_MODE,
            temperature: snap_temperature(t),
        },
        DeviceCommand::SetHvacMode(mode) => OperateCommand::Power {
            power: match mode {
                HvacMode::Heat => POWER_ON,
                HvacMode::Off => POWER_OFF,
            },
        },
    })
}

/// The reading a device should have once `command` took effect.
///
/// `None` when the command does not imply a known state (e.g. `Stop`).
pub fn optimistic_reading(
    kind: DeviceKind,
    current: Option<&Reading>,
    command: &DeviceCommand,
) -> Option<Reading> {
    match (kind, *command) {
        (DeviceKind::Switch, DeviceCommand::TurnOn) => Some(Reading::Switch { on: true }),
        (DeviceKind::Switch, DeviceCommand::TurnOff) => Some(Reading::Switch { on: false }),
        (DeviceKind::Blind, DeviceCommand::Open) => Some(Reading::Blind {
            position: BLIND_MAX_POSITION,
        }),
        (DeviceKind::Blind, DeviceCommand::Close) => Some(Reading::Blind { position: 0 }),
        (DeviceKind::Blind, DeviceCommand::SetPosition(p)) => Some(Reading::Blind {
            position: host_to_keemple_position(p),
        }),
        (DeviceKind::Thermostat, DeviceCommand::SetTargetTemperature(t)) => {
            let (power_on, current_temperature) = thermostat_parts(current);
            Some(Reading::Thermostat {
                power_on,
                target_temperature: Some(snap_temperature(t)),
                current_temperature,
            })
        }
        (DeviceKind::Thermostat, DeviceCommand::SetHvacMode(mode)) => {
            let (target_temperature, current_temperature) = match current {
                Some(Reading::Thermostat {
                    target_temperature,
                    current_temperature,
                    ..
                }) => (*target_temperature, *current_temperature),
                _ => (None, None),
            };
            Some(Reading::Thermostat {
                power_on: mode == HvacMode::Heat,
                target_temperature,
                current_temperature,
            })
        }
        _ => None,
    }
}

fn thermostat_parts(current: Option<&Reading>) -> (bool, Option<f64>) {
    match current {
        Some(Reading::Thermostat {
            power_on,
            current_temperature,
            ..
        }) => (*power_on, *current_temperature),
        _ => (false, None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn status(nuid: i64, devicetype: &str, status: i64, statuses: Vec<f64>) -> ApplianceStatus {
        ApplianceStatus {
            nuid,
            deviceid: format!("dev-{nuid}"),
            devicetype: devicetype.into(),
            status,
            statuses,
            battery: Some(120),
            lastactivetime: None,
            zwavedeviceid: nuid * 10,
        }
    }

    fn remote(name: &str, room: Option<&str>, status: ApplianceStatus) -> RemoteDevice {
        RemoteDevice {
            name: name.into(),
            room: room.map(str::to_owned),
            status,
        }
    }

    #[test]
    fn dual_switch_expands_into_channels() {
        let devices = vec![remote("Hall", Some("Hallway"), status(7, "42", 0, vec![1.0, 0.0]))];
        let out = descriptors(&devices, &DeviceTypeTable::default());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].device_id.as_str(), "7_1");
        assert_eq!(out[1].device_id.as_str(), "7_2");
        assert_eq!(out[1].channel, Some(2));
        assert_eq!(out[1].zwave_device_id, 70);
        assert_eq!(out[0].room.as_deref(), Some("Hallway"));

        assert_eq!(reading(&out[0], &devices[0].status), Reading::Switch { on: true });
        assert_eq!(reading(&out[1], &devices[0].status), Reading::Switch { on: false });
    }

    #[test]
    fn unknown_types_are_skipped() {
        let devices = vec![
            remote("Sensor", None, status(1, "77", 0, vec![])),
            remote("Lamp", None, status(2, "41", 1, vec![])),
        ];
        let out = descriptors(&devices, &DeviceTypeTable::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, DeviceKind::Switch);
        assert_eq!(reading(&out[0], &devices[1].status), Reading::Switch { on: true });
    }

    #[test]
    fn thermostat_reading_uses_status_indices() {
        let devices = vec![remote("Heater", None, status(3, "44", 0, vec![1.0, 22.0, 19.5]))];
        let out = descriptors(&devices, &DeviceTypeTable::default());
        assert_eq!(
            reading(&out[0], &devices[0].status),
            Reading::Thermostat {
                power_on: true,
                target_temperature: Some(22.0),
                current_temperature: Some(19.5),
            }
        );
    }

    #[test]
    fn thermostat_with_missing_statuses() {
        let devices = vec![remote("Heater", None, status(3, "44", 0, vec![]))];
        let out = descriptors(&devices, &DeviceTypeTable::default());
        assert_eq!(
            reading(&out[0], &devices[0].status),
            Reading::Thermostat {
                power_on: false,
                target_temperature: None,
                current_temperature: None,
            }
        );
    }

    #[test]
    fn thermostat_placeholder_slot_reads_as_absent() {
        let devices = vec![remote("Heater", None, status(3, "44", 0, vec![1.0, f64::NAN, 19.5]))];
        let out = descriptors(&devices, &DeviceTypeTable::default());
        assert_eq!(
            reading(&out[0], &devices[0].status),
            Reading::Thermostat {
                power_on: true,
                target_temperature: None,
                current_temperature: Some(19.5),
            }
        );
    }

    #[test]
    fn single_switch_treats_any_nonzero_status_as_on() {
        let devices = vec![
            remote("Lamp", None, status(2, "41", 255, vec![])),
            remote("Plug", None, status(5, "41", 0, vec![])),
        ];
        let out = descriptors(&devices, &DeviceTypeTable::default());
        assert_eq!(reading(&out[0], &devices[0].status), Reading::Switch { on: true });
        assert_eq!(reading(&out[1], &devices[1].status), Reading::Switch { on: false });
    }

    #[test]
    fn dual_switch_placeholder_channel_is_off() {
        let devices = vec![remote("Hall", None, status(7, "42", 0, vec![f64::NAN, 1.0]))];
        let out = descriptors(&devices, &DeviceTypeTable::default());
        assert_eq!(reading(&out[0], &devices[0].status), Reading::Switch { on: false });
        assert_eq!(reading(&out[1], &devices[0].status), Reading::Switch { on: true });
    }

    #[test]
    fn blind_position_is_clamped() {
        let devices = vec![remote("Blind", None, status(4, "43", 250, vec![]))];
        let out = descriptors(&devices, &DeviceTypeTable::default());
        assert_eq!(reading(&out[0], &devices[0].status), Reading::Blind { position: 99 });
    }

    #[test]
    fn battery_is_clamped() {
        assert_eq!(battery(&status(1, "41", 0, vec![])), Some(100));
    }

    #[test]
    fn position_scaling() {
        assert_eq!(keemple_to_host_position(0), 0);
        assert_eq!(keemple_to_host_position(99), 100);
        assert_eq!(keemple_to_host_position(50), 51);
        assert_eq!(keemple_to_host_position(98), 99);
        assert_eq!(host_to_keemple_position(100), 99);
        assert_eq!(host_to_keemple_position(0), 0);
        assert_eq!(host_to_keemple_position(50), 50);
    }

    #[test]
    fn scaling_is_stable_for_every_native_position() {
        for p in 0..=BLIND_MAX_POSITION {
            assert_eq!(host_to_keemple_position(keemple_to_host_position(p)), p);
        }
    }

    #[test]
    fn commands_map_to_payloads() {
        let devices = vec![remote("Blind", None, status(4, "43", 0, vec![]))];
        let blind = &descriptors(&devices, &DeviceTypeTable::default())[0];

        assert_eq!(
            operate_command(blind, &DeviceCommand::SetPosition(100)).unwrap(),
            OperateCommand::Operation {
                operation: Operation::Open,
                value: Some(99),
            }
        );
        assert_eq!(
            operate_command(blind, &DeviceCommand::Stop).unwrap(),
            OperateCommand::Operation {
                operation: Operation::Stop,
                value: None,
            }
        );
        assert!(matches!(
            operate_command(blind, &DeviceCommand::TurnOn),
            Err(CoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn thermostat_commands() {
        let devices = vec![remote("Heater", None, status(3, "44", 0, vec![]))];
        let heater = &descriptors(&devices, &DeviceTypeTable::default())[0];

        assert_eq!(
            operate_command(heater, &DeviceCommand::SetHvacMode(HvacMode::Heat)).unwrap(),
            OperateCommand::Power { power: 255 }
        );
        assert_eq!(
            operate_command(heater, &DeviceCommand::SetTargetTemperature(21.3)).unwrap(),
            OperateCommand::Temperature {
                mode: 1,
                temperature: 21.5,
            }
        );
        assert!(matches!(
            operate_command(heater, &DeviceCommand::SetTargetTemperature(40.0)),
            Err(CoreError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn optimistic_readings() {
        assert_eq!(
            optimistic_reading(DeviceKind::Blind, None, &DeviceCommand::Close),
            Some(Reading::Blind { position: 0 })
        );
        assert_eq!(
            optimistic_reading(DeviceKind::Blind, None, &DeviceCommand::Stop),
            None
        );

        let current = Reading::Thermostat {
            power_on: false,
            target_temperature: Some(18.0),
            current_temperature: Some(17.0),
        };
        assert_eq!(
            optimistic_reading(
                DeviceKind::Thermostat,
                Some(&current),
                &DeviceCommand::SetHvacMode(HvacMode::Heat)
            ),
            Some(Reading::Thermostat {
                power_on: true,
                target_temperature: Some(18.0),
                current_temperature: Some(17.0),
            })
        );
    }
}
