// Keemple API wire types
//
// Every response carries a `{resultCode, resultMessage}` envelope next to
// its payload. Field names follow the server (flat lowercase for appliance
// data, camelCase for the envelope). Numeric fields are parsed leniently
// because the cloud mixes numbers and numeric strings across firmware.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

// ── Envelope ─────────────────────────────────────────────────────────

/// `resultCode` value meaning success.
pub const RESULT_OK: i64 = 0;

/// `resultCode` returned when the session cookie/token is no longer valid.
pub const RESULT_SESSION_EXPIRED: i64 = 8;

/// The `{resultCode, resultMessage}` pair present on every response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub result_code: Option<i64>,
    #[serde(default)]
    pub result_message: Option<String>,
}

impl Envelope {
    pub fn is_ok(&self) -> bool {
        self.result_code.is_none_or(|c| c == RESULT_OK)
    }
}

// ── Login ────────────────────────────────────────────────────────────

/// Response of `POST /phoneuser/login`.
///
/// Older accounts get a cookie-only session and no `token` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub token: Option<String>,
    /// Session lifetime in seconds.
    #[serde(default, alias = "expires_in")]
    pub expires_in: Option<i64>,
}

// ── Changed data ─────────────────────────────────────────────────────

/// Response of `POST /data/querychangeddata2`: the full account snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangedData {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub appliancestatus: Vec<ApplianceStatus>,
    #[serde(default)]
    pub remote: Vec<Remote>,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

impl ChangedData {
    /// Resolve an appliance's display name from the `remote` lists.
    pub fn name_of(&self, nuid: i64) -> Option<&str> {
        self.remote
            .iter()
            .flat_map(|r| r.appliancelist.iter())
            .find(|a| a.nuid == nuid)
            .and_then(|a| a.name.as_deref())
    }

    /// Resolve the room an appliance is assigned to, if any.
    pub fn room_of(&self, nuid: i64) -> Option<&str> {
        self.rooms
            .iter()
            .find(|room| room.appliancelist.iter().any(|a| a.nuid == nuid))
            .and_then(|room| room.name.as_deref())
    }

    /// Find the status entry for an appliance.
    pub fn status_of(&self, nuid: i64) -> Option<&ApplianceStatus> {
        self.appliancestatus.iter().find(|s| s.nuid == nuid)
    }
}

/// Live status of a single appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceStatus {
    #[serde(deserialize_with = "required_i64")]
    pub nuid: i64,
    #[serde(default)]
    pub deviceid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub devicetype: String,
    /// Primary status: on/off for switches, 0..=99 position for blinds.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub status: i64,
    /// Per-channel / per-register values. The cloud sends either a JSON
    /// array or the same array rendered as a string (`"[1,0]"`). A list
    /// element that is not a number is kept as a NaN placeholder so later
    /// slots keep their index.
    #[serde(default, deserialize_with = "lenient_statuses")]
    pub statuses: Vec<f64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub battery: Option<i64>,
    #[serde(default)]
    pub lastactivetime: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub zwavedeviceid: i64,
}

/// A remote/gateway with the appliances paired to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Remote {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub appliancelist: Vec<ApplianceRef>,
}

/// A user-defined room.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Room {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub appliancelist: Vec<ApplianceRef>,
}

/// Name/identity pair referenced from remotes and rooms.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplianceRef {
    #[serde(deserialize_with = "required_i64")]
    pub nuid: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Flattened device listing: status plus the name and room resolved from
/// the rest of the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDevice {
    pub name: String,
    pub room: Option<String>,
    pub status: ApplianceStatus,
}

impl ChangedData {
    /// Flatten the snapshot into one [`RemoteDevice`] per appliance.
    pub fn devices(&self) -> Vec<RemoteDevice> {
        self.appliancestatus
            .iter()
            .map(|status| RemoteDevice {
                name: self.name_of(status.nuid).unwrap_or("Unknown").to_owned(),
                room: self.room_of(status.nuid).map(str::to_owned),
                status: status.clone(),
            })
            .collect()
    }
}

// ── Device operate ───────────────────────────────────────────────────

/// `operation` values accepted by `POST /device/operate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Open,
    Close,
    Stop,
}

/// JSON payload of the `command` query parameter of `/device/operate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperateCommand {
    /// Switches and blinds. `value` is a 0..=99 blind position.
    Operation {
        operation: Operation,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<i64>,
    },
    /// Thermostat target temperature (`mode` 1 = heating setpoint).
    Temperature { mode: u8, temperature: f64 },
    /// Thermostat power: 255 on, 0 off.
    Power { power: u8 },
}

/// Acknowledgment of an accepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub zwave_device_id: i64,
    pub channel: Option<u8>,
}

// ── Lenient field parsers ────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    Ok(lenient_opt_i64(de)?.unwrap_or_default())
}

/// Identifier fields: numeric or numeric string, never defaulted.
fn required_i64<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    lenient_opt_i64(de)?.ok_or_else(|| serde::de::Error::custom("expected a numeric id"))
}

/// Decode a list entry by entry, dropping entries that do not fit `T`
/// instead of failing the whole payload.
fn skip_invalid<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(de)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "skipping malformed list entry");
                None
            }
        })
        .collect())
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn lenient_opt_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    let raw: Option<NumberOrString> = Option::deserialize(de)?;
    Ok(match raw {
        Some(NumberOrString::Int(i)) => Some(i),
        Some(NumberOrString::Float(f)) => Some(f.round() as i64),
        Some(NumberOrString::Text(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        None => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    let raw: Option<NumberOrString> = Option::deserialize(de)?;
    Ok(match raw {
        Some(NumberOrString::Int(i)) => i.to_string(),
        Some(NumberOrString::Float(f)) => f.to_string(),
        Some(NumberOrString::Text(s)) => s,
        None => String::new(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusesRepr {
    List(Vec<NumberOrString>),
    Text(String),
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn number_value(raw: NumberOrString) -> f64 {
    match raw {
        NumberOrString::Int(i) => i as f64,
        NumberOrString::Float(f) => f,
        NumberOrString::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
    }
}

fn lenient_statuses<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<f64>, D::Error> {
    let raw: Option<StatusesRepr> = Option::deserialize(de)?;
    Ok(match raw {
        Some(StatusesRepr::List(items)) => items.into_iter().map(number_value).collect(),
        Some(StatusesRepr::Text(s)) => parse_statuses(&s),
        None => Vec::new(),
    })
}

/// Parse a `"[1, 0, 21.5]"` status string. Unparseable input yields an
/// empty list.
pub fn parse_statuses(raw: &str) -> Vec<f64> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn statuses_from_string() {
        assert_eq!(parse_statuses("[1, 0]"), vec![1.0, 0.0]);
        assert_eq!(parse_statuses("[]"), Vec::<f64>::new());
        assert_eq!(parse_statuses("[1, x]"), Vec::<f64>::new());
    }

    #[test]
    fn appliance_status_accepts_mixed_types() {
        let raw = json!({
            "nuid": "17",
            "deviceid": "abc",
            "devicetype": 42,
            "status": 1,
            "statuses": "[1,0]",
            "battery": "88",
            "zwavedeviceid": 5001
        });
        let status: ApplianceStatus = serde_json::from_value(raw).unwrap();
        assert_eq!(status.nuid, 17);
        assert_eq!(status.devicetype, "42");
        assert_eq!(status.statuses, vec![1.0, 0.0]);
        assert_eq!(status.battery, Some(88));
        assert_eq!(status.zwavedeviceid, 5001);
    }

    #[test]
    fn appliance_status_list_statuses() {
        let raw = json!({
            "nuid": 3,
            "devicetype": "44",
            "statuses": [1, 21.5, "19.0"]
        });
        let status: ApplianceStatus = serde_json::from_value(raw).unwrap();
        assert_eq!(status.statuses, vec![1.0, 21.5, 19.0]);
        assert_eq!(status.status, 0);
        assert_eq!(status.battery, None);
    }

    #[test]
    fn bad_statuses_element_keeps_later_indices() {
        let raw = json!({ "nuid": 3, "devicetype": "44", "statuses": [1, "n/a", 19.5] });
        let status: ApplianceStatus = serde_json::from_value(raw).unwrap();
        assert_eq!(status.statuses.len(), 3);
        assert!(status.statuses[1].is_nan());
        assert!((status.statuses[2] - 19.5).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_appliance_entry_is_skipped() {
        let raw = json!({
            "resultCode": 0,
            "appliancestatus": [
                { "devicetype": "41", "status": 1 },
                { "nuid": "x", "devicetype": "41", "status": 1 },
                { "nuid": 2, "devicetype": "43", "status": 40, "zwavedeviceid": 12 }
            ],
            "remote": [{ "appliancelist": [{ "name": "orphan" }, { "nuid": 2, "name": "Blind" }] }]
        });
        let data: ChangedData = serde_json::from_value(raw).unwrap();
        let devices = data.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].status.nuid, 2);
        assert_eq!(devices[0].name, "Blind");
    }

    #[test]
    fn changed_data_resolves_names_and_rooms() {
        let raw = json!({
            "resultCode": 0,
            "appliancestatus": [
                { "nuid": 1, "devicetype": "41", "status": 1, "zwavedeviceid": 11 },
                { "nuid": 2, "devicetype": "43", "status": 40, "zwavedeviceid": 12 }
            ],
            "remote": [{ "appliancelist": [
                { "nuid": 1, "name": "Hall light" },
                { "nuid": 2, "name": "Kitchen blind" }
            ]}],
            "rooms": [{ "name": "Kitchen", "appliancelist": [{ "nuid": 2 }] }]
        });
        let data: ChangedData = serde_json::from_value(raw).unwrap();
        let devices = data.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Hall light");
        assert_eq!(devices[0].room, None);
        assert_eq!(devices[1].room.as_deref(), Some("Kitchen"));
    }

    #[test]
    fn operate_command_payloads() {
        let open = OperateCommand::Operation {
            operation: Operation::Open,
            value: None,
        };
        assert_eq!(
            serde_json::to_value(&open).unwrap(),
            json!({ "operation": "open" })
        );

        let position = OperateCommand::Operation {
            operation: Operation::Open,
            value: Some(40),
        };
        assert_eq!(
            serde_json::to_value(&position).unwrap(),
            json!({ "operation": "open", "value": 40 })
        );

        let temp = OperateCommand::Temperature {
            mode: 1,
            temperature: 21.5,
        };
        assert_eq!(
            serde_json::to_value(&temp).unwrap(),
            json!({ "mode": 1, "temperature": 21.5 })
        );

        let power = OperateCommand::Power { power: 255 };
        assert_eq!(
            serde_json::to_value(&power).unwrap(),
            json!({ "power": 255 })
        );
    }

    #[test]
    fn envelope_without_code_is_ok() {
        let env: Envelope = serde_json::from_value(json!({})).unwrap();
        assert!(env.is_ok());
        let env: Envelope =
            serde_json::from_value(json!({ "resultCode": 3, "resultMessage": "bad" })).unwrap();
        assert!(!env.is_ok());
    }
}
