// ── Device state cache ──
//
// Single-writer (the sync engine), multi-reader cache of device states.
// Observable changes are broadcast as `StateChange` notifications; the
// full snapshot is also available as a `watch`-backed stream.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use super::collection::EntityCollection;
use crate::model::{DeviceId, DeviceState, StateChange};
use crate::stream::EntityStream;

const CHANGE_CHANNEL_SIZE: usize = 256;

/// Cache of the last known state of every registered device.
pub struct StateCache {
    states: EntityCollection<DeviceState>,
    changes: broadcast::Sender<StateChange>,
}

impl StateCache {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            states: EntityCollection::new(),
            changes,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: &DeviceId) -> Option<Arc<DeviceState>> {
        self.states.get(id)
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceState>>> {
        self.states.snapshot()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.len() == 0
    }

    /// Number of mutations applied so far.
    pub fn version(&self) -> u64 {
        self.states.version()
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.states.ids()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Stream of full snapshots, one per mutation.
    pub fn subscribe(&self) -> EntityStream<DeviceState> {
        EntityStream::new(self.states.subscribe())
    }

    /// Per-device change notifications.
    pub fn changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    // ── Writes (sync engine only) ────────────────────────────────────

    /// Store `state`. Emits [`StateChange::Updated`] when the reading,
    /// battery, or availability differs from the cached value, or the
    /// device is new. Returns whether a notification was sent.
    pub(crate) fn write(&self, state: DeviceState) -> bool {
        let previous = self.states.get(&state.device_id);

        let observable = match previous {
            Some(ref prev) => {
                if !prev.differs_observably(&state)
                    && prev.consecutive_failures == state.consecutive_failures
                    && prev.last_active == state.last_active
                {
                    trace!(device_id = %state.device_id, "state unchanged");
                    return false;
                }
                prev.differs_observably(&state)
            }
            None => true,
        };

        let id = state.device_id.clone();
        self.states.upsert(id.clone(), state);

        if observable {
            if let Some(current) = self.states.get(&id) {
                let _ = self.changes.send(StateChange::Updated { previous, current });
            }
        }
        observable
    }

    /// Drop a device's state, emitting [`StateChange::Removed`].
    pub(crate) fn remove(&self, id: &DeviceId) -> bool {
        if self.states.remove(id).is_some() {
            let _ = self.changes.send(StateChange::Removed {
                device_id: id.clone(),
            });
            true
        } else {
            false
        }
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}
