// ── Device registry ──
//
// The authoritative set of device descriptors for the account. Each sync
// replaces the full set from the remote listing and reports what was
// added, removed, or renamed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use keemple_api::RemoteDevice;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::DeviceTypeTable;
use crate::convert;
use crate::model::{DeviceDescriptor, DeviceId, DeviceKind};
use crate::store::EntityCollection;
use crate::stream::EntityStream;

/// Room bucket for devices not assigned to any room.
pub const UNASSIGNED_ROOM: &str = "Unassigned";

const REGISTRY_CHANNEL_SIZE: usize = 64;

/// A name change detected during sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renamed {
    pub device_id: DeviceId,
    pub from: String,
    pub to: String,
}

/// Outcome of a registry sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryDiff {
    pub added: Vec<DeviceId>,
    pub removed: Vec<DeviceId>,
    pub renamed: Vec<Renamed>,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.renamed.is_empty()
    }
}

/// Registry of known devices, keyed by [`DeviceId`].
pub struct DeviceRegistry {
    devices: EntityCollection<DeviceDescriptor>,
    types: DeviceTypeTable,
    changes: broadcast::Sender<Arc<RegistryDiff>>,
}

impl DeviceRegistry {
    pub fn new(types: DeviceTypeTable) -> Self {
        let (changes, _) = broadcast::channel(REGISTRY_CHANNEL_SIZE);
        Self {
            devices: EntityCollection::new(),
            types,
            changes,
        }
    }

    pub fn device_types(&self) -> &DeviceTypeTable {
        &self.types
    }

    // ── Sync ─────────────────────────────────────────────────────────

    /// Replace the device set with the classified `remote` listing.
    ///
    /// Subscribers are notified only when the diff is non-empty, so
    /// repeated syncs of an unchanged listing are silent.
    pub fn sync(&self, remote: &[RemoteDevice]) -> RegistryDiff {
        let incoming = convert::descriptors(remote, &self.types);
        let incoming_ids: BTreeSet<DeviceId> =
            incoming.iter().map(|d| d.device_id.clone()).collect();

        let mut diff = RegistryDiff::default();

        for id in self.devices.ids() {
            if !incoming_ids.contains(&id) {
                self.devices.remove(&id);
                diff.removed.push(id);
            }
        }

        for descriptor in incoming {
            match self.devices.get(&descriptor.device_id) {
                None => {
                    diff.added.push(descriptor.device_id.clone());
                    self.devices.upsert(descriptor.device_id.clone(), descriptor);
                }
                Some(existing) if *existing != descriptor => {
                    if existing.name != descriptor.name {
                        diff.renamed.push(Renamed {
                            device_id: descriptor.device_id.clone(),
                            from: existing.name.clone(),
                            to: descriptor.name.clone(),
                        });
                    }
                    self.devices.upsert(descriptor.device_id.clone(), descriptor);
                }
                Some(_) => {}
            }
        }

        diff.added.sort();
        diff.removed.sort();

        if diff.is_empty() {
            debug!(devices = self.devices.len(), "registry unchanged");
        } else {
            info!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                renamed = diff.renamed.len(),
                "registry changed"
            );
            let _ = self.changes.send(Arc::new(diff.clone()));
        }

        diff
    }

    /// Remove every device belonging to appliance `nuid`.
    ///
    /// Used when a single-device read reports the appliance gone.
    pub fn remove_appliance(&self, nuid: i64) -> Vec<DeviceId> {
        let removed: Vec<DeviceId> = self
            .devices
            .snapshot()
            .iter()
            .filter(|d| d.nuid == nuid)
            .map(|d| d.device_id.clone())
            .collect();

        for id in &removed {
            self.devices.remove(id);
        }

        if !removed.is_empty() {
            info!(nuid, devices = removed.len(), "appliance removed");
            let _ = self.changes.send(Arc::new(RegistryDiff {
                removed: removed.clone(),
                ..RegistryDiff::default()
            }));
        }
        removed
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn get(&self, id: &DeviceId) -> Option<Arc<DeviceDescriptor>> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.len() == 0
    }

    /// All descriptors, sorted by id.
    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceDescriptor>>> {
        self.devices.snapshot()
    }

    pub fn by_kind(&self, kind: DeviceKind) -> Vec<Arc<DeviceDescriptor>> {
        self.snapshot()
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect()
    }

    /// Devices in `room`. [`UNASSIGNED_ROOM`] selects devices with none.
    pub fn by_room(&self, room: &str) -> Vec<Arc<DeviceDescriptor>> {
        self.snapshot()
            .iter()
            .filter(|d| room_name(d) == room)
            .cloned()
            .collect()
    }

    /// Devices grouped by room, with an [`UNASSIGNED_ROOM`] bucket.
    pub fn rooms(&self) -> BTreeMap<String, Vec<Arc<DeviceDescriptor>>> {
        let mut rooms: BTreeMap<String, Vec<Arc<DeviceDescriptor>>> = BTreeMap::new();
        rooms.insert(UNASSIGNED_ROOM.to_owned(), Vec::new());
        for device in self.snapshot().iter() {
            rooms
                .entry(room_name(device).to_owned())
                .or_default()
                .push(Arc::clone(device));
        }
        rooms
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Non-empty diffs from every sync.
    pub fn changes(&self) -> broadcast::Receiver<Arc<RegistryDiff>> {
        self.changes.subscribe()
    }

    /// Stream of full descriptor snapshots.
    pub fn subscribe(&self) -> EntityStream<DeviceDescriptor> {
        EntityStream::new(self.devices.subscribe())
    }
}

fn room_name(device: &DeviceDescriptor) -> &str {
    device
        .room
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(UNASSIGNED_ROOM)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use keemple_api::ApplianceStatus;
    use pretty_assertions::assert_eq;

    use super::*;

    fn remote(nuid: i64, devicetype: &str, name: &str, room: Option<&str>) -> RemoteDevice {
        RemoteDevice {
            name: name.into(),
            room: room.map(str::to_owned),
            status: ApplianceStatus {
                nuid,
                deviceid: String::new(),
                devicetype: devicetype.into(),
                status: 0,
                statuses: Vec::new(),
                battery: None,
                lastactivetime: None,
                zwavedeviceid: nuid,
            },
        }
    }

    fn listing() -> Vec<RemoteDevice> {
        vec![
            remote(1, "41", "Lamp", Some("Kitchen")),
            remote(2, "42", "Hall", None),
            remote(3, "43", "Blind", Some("Kitchen")),
            remote(4, "99", "Sensor", None),
        ]
    }

    #[test]
    fn initial_sync_adds_everything_supported() {
        let registry = DeviceRegistry::new(DeviceTypeTable::default());
        let diff = registry.sync(&listing());

        assert_eq!(
            diff.added,
            vec![
                DeviceId::from("1"),
                DeviceId::from("2_1"),
                DeviceId::from("2_2"),
                DeviceId::from("3"),
            ]
        );
        assert!(diff.removed.is_empty());
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn unchanged_sync_is_silent() {
        let registry = DeviceRegistry::new(DeviceTypeTable::default());
        registry.sync(&listing());
        let mut rx = registry.changes();

        let diff = registry.sync(&listing());
        assert!(diff.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn removal_and_rename_are_reported() {
        let registry = DeviceRegistry::new(DeviceTypeTable::default());
        registry.sync(&listing());
        let mut rx = registry.changes();

        let next = vec![
            remote(1, "41", "Ceiling lamp", Some("Kitchen")),
            remote(3, "43", "Blind", Some("Kitchen")),
        ];
        let diff = registry.sync(&next);

        assert_eq!(diff.removed, vec![DeviceId::from("2_1"), DeviceId::from("2_2")]);
        assert_eq!(
            diff.renamed,
            vec![Renamed {
                device_id: DeviceId::from("1"),
                from: "Lamp".into(),
                to: "Ceiling lamp".into(),
            }]
        );
        assert_eq!(*rx.try_recv().unwrap(), diff);
        assert_eq!(registry.get(&DeviceId::from("1")).unwrap().name, "Ceiling lamp");
    }

    #[test]
    fn rooms_include_unassigned_bucket() {
        let registry = DeviceRegistry::new(DeviceTypeTable::default());
        registry.sync(&listing());

        let rooms = registry.rooms();
        assert_eq!(rooms["Kitchen"].len(), 2);
        assert_eq!(rooms[UNASSIGNED_ROOM].len(), 2);
        assert_eq!(registry.by_room(UNASSIGNED_ROOM).len(), 2);
        assert_eq!(registry.by_kind(DeviceKind::Switch).len(), 3);
        assert_eq!(registry.by_kind(DeviceKind::Thermostat).len(), 0);
    }

    #[test]
    fn remove_appliance_drops_all_channels() {
        let registry = DeviceRegistry::new(DeviceTypeTable::default());
        registry.sync(&listing());

        let removed = registry.remove_appliance(2);
        assert_eq!(removed.len(), 2);
        assert!(!registry.contains(&DeviceId::from("2_1")));
        assert!(registry.remove_appliance(2).is_empty());
    }
}
