// ── State sync engine ──
//
// Polls the Keemple cloud, keeps the registry and the state cache in
// step with it, and applies commands with optimistic cache updates.
// The engine is the only writer of the state cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use keemple_api::{ApplianceStatus, KeempleClient};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::convert;
use crate::error::CoreError;
use crate::model::{
    Availability, DeviceCommand, DeviceDescriptor, DeviceId, DeviceState,
};
use crate::registry::{DeviceRegistry, RegistryDiff};
use crate::store::StateCache;

/// Result of a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The cycle ran. `changed` counts devices whose observable state moved.
    Completed { diff: RegistryDiff, changed: usize },
    /// Another cycle was already running.
    Skipped,
}

/// Tuning knobs for the engine, taken from `HubConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub stale_after: u32,
    pub refresh_delay: Duration,
}

/// How a failed read affects availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// Retries exhausted or no session: the device cannot be reached.
    Unreachable,
    /// Anything else: counts toward staleness.
    Degraded,
}

impl Failure {
    fn classify(err: &keemple_api::Error) -> Self {
        if err.is_exhausted() || err.is_credentials_error() || err.is_auth_expired() {
            Self::Unreachable
        } else {
            Self::Degraded
        }
    }
}

/// Keeps the registry and state cache synchronized with the cloud.
pub struct SyncEngine {
    client: Arc<KeempleClient>,
    registry: Arc<DeviceRegistry>,
    cache: Arc<StateCache>,
    settings: SyncSettings,
    /// Serializes command sends and reconciles per device.
    device_locks: DashMap<DeviceId, Arc<Mutex<()>>>,
    /// Orders poll starts against command acks.
    sequence: AtomicU64,
    /// Sequence number of the last acknowledged command per device.
    acked: DashMap<DeviceId, u64>,
    /// Held for the duration of a poll cycle.
    cycle: Mutex<()>,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn new(
        client: Arc<KeempleClient>,
        registry: Arc<DeviceRegistry>,
        cache: Arc<StateCache>,
        settings: SyncSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            registry,
            cache,
            settings,
            device_locks: DashMap::new(),
            sequence: AtomicU64::new(0),
            acked: DashMap::new(),
            cycle: Mutex::new(()),
            cancel,
        }
    }

    pub fn client(&self) -> &Arc<KeempleClient> {
        &self.client
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Run one poll cycle: fetch the account snapshot, sync the registry,
    /// and reconcile every device against it.
    ///
    /// Returns [`PollOutcome::Skipped`] without any I/O if a cycle is
    /// already in progress. Devices that acknowledged a command while the
    /// snapshot was in flight keep their commanded state until the next
    /// cycle.
    pub async fn poll_cycle(&self) -> Result<PollOutcome, CoreError> {
        let Ok(_cycle) = self.cycle.try_lock() else {
            debug!("poll cycle already running, skipping tick");
            return Ok(PollOutcome::Skipped);
        };
        let started = self.sequence.fetch_add(1, Ordering::SeqCst);

        let snapshot = match self.client.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(operation = "poll", error = %e, "snapshot fetch failed");
                let failure = Failure::classify(&e);
                for id in self.cache.ids() {
                    let lock = self.device_lock(&id);
                    let _held = lock.lock().await;
                    if !self.acked_since(&id, started) {
                        self.record_failure(&id, failure);
                    }
                }
                return Err(e.into());
            }
        };

        let diff = self.apply_registry(&snapshot.devices()).await;

        let mut changed = 0;
        for descriptor in self.registry.snapshot().iter() {
            let Some(status) = snapshot.status_of(descriptor.nuid) else {
                continue;
            };
            let lock = self.device_lock(&descriptor.device_id);
            let _held = lock.lock().await;
            if self.acked_since(&descriptor.device_id, started) {
                debug!(
                    device_id = %descriptor.device_id,
                    "command acknowledged during poll, keeping commanded state"
                );
                continue;
            }
            if self.record_success(descriptor, status) {
                changed += 1;
            }
        }

        debug!(
            devices = self.registry.len(),
            changed,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "poll cycle complete"
        );
        Ok(PollOutcome::Completed { diff, changed })
    }

    /// Refresh the registry from the device listing without touching
    /// cached readings of devices that stay.
    pub async fn sync_registry(&self) -> Result<RegistryDiff, CoreError> {
        let devices = self.client.fetch_devices().await?;
        Ok(self.apply_registry(&devices).await)
    }

    async fn apply_registry(&self, devices: &[keemple_api::RemoteDevice]) -> RegistryDiff {
        let diff = self.registry.sync(devices);
        self.purge(&diff.removed).await;
        diff
    }

    /// Re-read a single device and reconcile it.
    pub async fn refresh_device(&self, id: &DeviceId) -> Result<Arc<DeviceState>, CoreError> {
        let descriptor = self.descriptor(id)?;
        let lock = self.device_lock(id);
        let held = lock.lock().await;

        match self.client.fetch_state(descriptor.nuid).await {
            Ok(status) => {
                self.record_success(&descriptor, &status);
                match self.cache.get(id) {
                    Some(state) if self.registry.contains(id) => Ok(state),
                    _ => Err(not_found(id)),
                }
            }
            Err(e) if e.is_not_found() => {
                drop(held);
                info!(device_id = %id, "device no longer on the account");
                self.forget_appliance(descriptor.nuid).await;
                Err(not_found(id))
            }
            Err(e) => {
                warn!(device_id = %id, operation = "refresh", error = %e, "device refresh failed");
                self.record_failure(id, Failure::classify(&e));
                Err(e.into())
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send `command` to a device and update the cache optimistically.
    ///
    /// The next poll reconciles the optimistic value with the cloud.
    pub async fn set_state(
        self: &Arc<Self>,
        id: &DeviceId,
        command: DeviceCommand,
    ) -> Result<Option<Arc<DeviceState>>, CoreError> {
        let descriptor = self.descriptor(id)?;
        let payload = convert::operate_command(&descriptor, &command)?;

        {
            let lock = self.device_lock(id);
            let _held = lock.lock().await;

            if let Err(e) = self
                .client
                .send_command(descriptor.zwave_device_id, descriptor.channel, &payload)
                .await
            {
                warn!(
                    device_id = %id,
                    operation = command.name(),
                    error = %e,
                    "command failed"
                );
                return Err(e.into());
            }

            info!(device_id = %id, operation = command.name(), "command acknowledged");
            self.acked
                .insert(id.clone(), self.sequence.fetch_add(1, Ordering::SeqCst));
            self.record_optimistic(&descriptor, &command);
        }

        if !self.settings.refresh_delay.is_zero() {
            self.schedule_refresh(id.clone());
        }

        Ok(self.cache.get(id))
    }

    fn schedule_refresh(self: &Arc<Self>, id: DeviceId) {
        let engine = Arc::clone(self);
        let delay = self.settings.refresh_delay;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if let Err(e) = engine.refresh_device(&id).await {
                        debug!(device_id = %id, error = %e, "delayed refresh failed");
                    }
                }
            }
        });
    }

    // ── Reconcile ────────────────────────────────────────────────────

    // Writers hold the device lock and re-check registration so a device
    // removed mid-request never gets its state re-inserted.

    fn record_success(&self, descriptor: &DeviceDescriptor, status: &ApplianceStatus) -> bool {
        if !self.registry.contains(&descriptor.device_id) {
            return false;
        }
        let mut next = DeviceState::new(
            descriptor.device_id.clone(),
            convert::reading(descriptor, status),
        );
        next.battery = convert::battery(status);
        next.last_active.clone_from(&status.lastactivetime);

        if let Some(prev) = self.cache.get(&descriptor.device_id) {
            if !prev.differs_observably(&next) {
                next.last_updated = prev.last_updated;
            }
            if prev.availability != Availability::Available {
                info!(device_id = %descriptor.device_id, "device available again");
            }
        }

        self.cache.write(next)
    }

    fn record_failure(&self, id: &DeviceId, failure: Failure) -> bool {
        let Some(prev) = self.cache.get(id) else {
            return false;
        };

        let mut next = (*prev).clone();
        next.consecutive_failures = prev.consecutive_failures.saturating_add(1);
        next.availability = match failure {
            Failure::Unreachable => Availability::Unavailable,
            Failure::Degraded
                if prev.availability == Availability::Available
                    && next.consecutive_failures >= self.settings.stale_after.max(1) =>
            {
                Availability::Stale
            }
            Failure::Degraded => prev.availability,
        };

        if next.availability != prev.availability {
            warn!(
                device_id = %id,
                failures = next.consecutive_failures,
                availability = %next.availability,
                "device availability changed"
            );
            next.last_updated = Utc::now();
        }

        self.cache.write(next)
    }

    fn record_optimistic(&self, descriptor: &DeviceDescriptor, command: &DeviceCommand) {
        let id = &descriptor.device_id;
        if !self.registry.contains(id) {
            debug!(device_id = %id, "device removed while the command was in flight");
            return;
        }
        let previous = self.cache.get(id);
        let Some(reading) = convert::optimistic_reading(
            descriptor.kind,
            previous.as_ref().map(|s| &s.reading),
            command,
        ) else {
            return;
        };

        let mut next = previous
            .as_deref()
            .cloned()
            .unwrap_or_else(|| DeviceState::new(id.clone(), reading.clone()));
        next.reading = reading;
        next.availability = Availability::Available;
        next.consecutive_failures = 0;
        next.last_updated = Utc::now();
        self.cache.write(next);
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn descriptor(&self, id: &DeviceId) -> Result<Arc<DeviceDescriptor>, CoreError> {
        self.registry.get(id).ok_or_else(|| not_found(id))
    }

    fn device_lock(&self, id: &DeviceId) -> Arc<Mutex<()>> {
        Arc::clone(self.device_locks.entry(id.clone()).or_default().value())
    }

    fn acked_since(&self, id: &DeviceId, started: u64) -> bool {
        self.acked.get(id).is_some_and(|seq| *seq > started)
    }

    /// Must not be called while holding a device lock.
    async fn forget_appliance(&self, nuid: i64) {
        let removed = self.registry.remove_appliance(nuid);
        self.purge(&removed).await;
    }

    /// Drop per-device bookkeeping for devices already gone from the
    /// registry, under each device's lock.
    async fn purge(&self, ids: &[DeviceId]) {
        for id in ids {
            let lock = self.device_lock(id);
            let held = lock.lock().await;
            self.cache.remove(id);
            self.acked.remove(id);
            drop(held);
            self.device_locks.remove(id);
        }
    }
}

fn not_found(id: &DeviceId) -> CoreError {
    CoreError::DeviceNotFound {
        identifier: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_and_auth_failures_are_unreachable() {
        let exhausted = keemple_api::Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(keemple_api::Error::Http {
                status: 503,
                message: String::new(),
            }),
        };
        assert_eq!(Failure::classify(&exhausted), Failure::Unreachable);
        assert_eq!(
            Failure::classify(&keemple_api::Error::SessionExpired),
            Failure::Unreachable
        );
        assert_eq!(
            Failure::classify(&keemple_api::Error::InvalidCredentials {
                message: String::new()
            }),
            Failure::Unreachable
        );
    }

    #[test]
    fn envelope_errors_degrade() {
        let err = keemple_api::Error::Api {
            code: 30,
            message: "busy".into(),
        };
        assert_eq!(Failure::classify(&err), Failure::Degraded);
    }
}
