// ── Reactive keyed collection ──
//
// Concurrent storage keyed by DeviceId with push-based change
// notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::DeviceId;

/// A concurrent, reactive collection of one value type.
///
/// Uses `DashMap` for O(1) lookups and a `watch` channel carrying a
/// snapshot sorted by id. Every mutation bumps a version counter and
/// rebuilds the snapshot that subscribers receive.
pub(crate) struct EntityCollection<T: Send + Sync + 'static> {
    by_id: DashMap<DeviceId, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace a value. Returns the previous value, if any.
    pub(crate) fn upsert(&self, id: DeviceId, value: T) -> Option<Arc<T>> {
        let previous = self.by_id.insert(id, Arc::new(value));
        self.rebuild_snapshot();
        self.bump_version();
        previous
    }

    /// Remove a value. Returns it if it existed.
    pub(crate) fn remove(&self, id: &DeviceId) -> Option<Arc<T>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    pub(crate) fn get(&self, id: &DeviceId) -> Option<Arc<T>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, id: &DeviceId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.by_id.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(DeviceId, Arc<T>)> = self
            .by_id
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_previous() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.upsert(DeviceId::from("1"), "a".into()).is_none());
        let prev = col.upsert(DeviceId::from("1"), "b".into());
        assert_eq!(*prev.unwrap(), "a");
        assert_eq!(*col.get(&DeviceId::from("1")).unwrap(), "b");
    }

    #[test]
    fn remove_and_contains() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert(DeviceId::from("1"), "a".into());
        assert!(col.contains(&DeviceId::from("1")));

        assert_eq!(*col.remove(&DeviceId::from("1")).unwrap(), "a");
        assert!(col.remove(&DeviceId::from("1")).is_none());
        assert_eq!(col.len(), 0);
    }

    #[test]
    fn snapshot_is_sorted_by_id() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert(DeviceId::from("3"), "c".into());
        col.upsert(DeviceId::from("1"), "a".into());
        col.upsert(DeviceId::from("2"), "b".into());

        let snap = col.snapshot();
        let values: Vec<&str> = snap.iter().map(|s| s.as_str()).collect();
        assert_eq!(values, ["a", "b", "c"]);
        assert_eq!(col.ids(), vec![DeviceId::from("1"), DeviceId::from("2"), DeviceId::from("3")]);
    }

    #[test]
    fn version_bumps_only_on_mutation() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert_eq!(col.version(), 0);
        col.upsert(DeviceId::from("1"), "a".into());
        col.remove(&DeviceId::from("missing"));
        assert_eq!(col.version(), 1);
    }
}
