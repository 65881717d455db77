// Device endpoints: snapshot, listing, per-device state, commands.

use tracing::debug;

use crate::client::{DEFAULT_PLATFORM, KeempleClient};
use crate::error::Error;
use crate::models::{Ack, ApplianceStatus, ChangedData, Envelope, OperateCommand, RemoteDevice};

const CHANGED_DATA_PATH: &str = "data/querychangeddata2";
const OPERATE_PATH: &str = "device/operate";

impl KeempleClient {
    /// Fetch the full account snapshot: statuses, remotes, and rooms.
    ///
    /// The poll cycle uses this once per tick for every device.
    pub async fn fetch_snapshot(&self) -> Result<ChangedData, Error> {
        let params = [("platform", DEFAULT_PLATFORM.to_owned())];
        let data: ChangedData = self.post_authenticated(CHANGED_DATA_PATH, &params).await?;
        debug!(
            appliances = data.appliancestatus.len(),
            rooms = data.rooms.len(),
            "fetched snapshot"
        );
        Ok(data)
    }

    /// List every appliance on the account with its name and room.
    pub async fn fetch_devices(&self) -> Result<Vec<RemoteDevice>, Error> {
        Ok(self.fetch_snapshot().await?.devices())
    }

    /// Fetch the status of a single appliance.
    ///
    /// Returns [`Error::DeviceNotFound`] if the account no longer has it.
    pub async fn fetch_state(&self, nuid: i64) -> Result<ApplianceStatus, Error> {
        let data = self.fetch_snapshot().await?;
        data.status_of(nuid)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                device: nuid.to_string(),
            })
    }

    /// Send an operate command to an appliance, optionally on one channel.
    pub async fn send_command(
        &self,
        zwave_device_id: i64,
        channel: Option<u8>,
        command: &OperateCommand,
    ) -> Result<Ack, Error> {
        let payload = serde_json::to_string(command).map_err(|e| Error::Deserialization {
            message: format!("failed to encode command: {e}"),
            body: String::new(),
        })?;

        let mut params = vec![
            ("platform", DEFAULT_PLATFORM.to_owned()),
            ("zwavedeviceid", zwave_device_id.to_string()),
            ("command", payload),
        ];
        if let Some(ch) = channel {
            params.push(("channel", ch.to_string()));
        }

        debug!(zwave_device_id, ?channel, ?command, "sending command");
        let _: Envelope = self.post_authenticated(OPERATE_PATH, &params).await?;

        Ok(Ack {
            zwave_device_id,
            channel,
        })
    }
}
