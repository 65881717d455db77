// ── Hub runtime context ──
//
// Full lifecycle management for one Keemple account: authentication,
// the background poll loop, command routing through the sync engine,
// and reactive access to the registry and the state cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use keemple_api::transport::{TlsMode, TransportConfig};
use keemple_api::KeempleClient;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{HubConfig, TlsVerification};
use crate::entity::Entity;
use crate::error::CoreError;
use crate::model::{DeviceCommand, DeviceDescriptor, DeviceId, DeviceKind, DeviceState, StateChange};
use crate::registry::{DeviceRegistry, RegistryDiff};
use crate::store::StateCache;
use crate::stream::EntityStream;
use crate::sync::{PollOutcome, SyncEngine, SyncSettings};

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Hub ──────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<HubInner>`. Constructing a hub does no I/O;
/// call [`connect()`](Self::connect) to authenticate and start polling.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    registry: Arc<DeviceRegistry>,
    cache: Arc<StateCache>,
    engine: Mutex<Option<Arc<SyncEngine>>>,
    connection_state: Arc<watch::Sender<ConnectionState>>,
    /// Cancels the current connection's tasks; replaced on every connect.
    cancel: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes connect and disconnect.
    lifecycle: Mutex<()>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(DeviceRegistry::new(config.device_types.clone()));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(HubInner {
                config,
                registry,
                cache: Arc::new(StateCache::new()),
                engine: Mutex::new(None),
                connection_state: Arc::new(connection_state),
                cancel: Mutex::new(CancellationToken::new()),
                task_handles: Mutex::new(Vec::new()),
                lifecycle: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn cache(&self) -> &Arc<StateCache> {
        &self.inner.cache
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the Keemple cloud.
    ///
    /// Validates the credentials, logs in, runs an initial poll cycle, and
    /// spawns the background poll loop unless `poll_interval` is zero.
    /// An existing connection is torn down (and logged out) first.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.teardown().await {
            debug!("replacing previous connection");
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        match self.establish().await {
            Ok(()) => {
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::Connected);
                info!(
                    devices = self.inner.registry.len(),
                    "connected to Keemple cloud"
                );
                Ok(())
            }
            Err(e) => {
                self.inner.connection_state.send_replace(ConnectionState::Failed);
                warn!(error = %e, "connection failed");
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;
        config.credentials.validate()?;

        let session_ttl = chrono::Duration::from_std(config.session_ttl)
            .map_err(|e| CoreError::Config {
                message: format!("session TTL out of range: {e}"),
            })?;
        let client = KeempleClient::new(
            &config.base_url,
            config.credentials.clone(),
            &build_transport(config),
        )?
        .with_session_ttl(session_ttl);

        client.authenticate().await?;
        debug!(account = config.credentials.account_id(), "session established");

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().await = cancel.clone();

        let engine = Arc::new(SyncEngine::new(
            Arc::new(client),
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.cache),
            SyncSettings {
                stale_after: config.stale_after,
                refresh_delay: config.refresh_delay,
            },
            cancel.child_token(),
        ));

        if let Err(e) = engine.poll_cycle().await {
            if let Err(logout) = engine.client().logout().await {
                debug!(error = %logout, "logout after failed connect");
            }
            return Err(e);
        }
        *self.inner.engine.lock().await = Some(Arc::clone(&engine));

        if !config.poll_interval.is_zero() {
            let state = Arc::clone(&self.inner.connection_state);
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(poll_task(
                    engine,
                    config.poll_interval,
                    cancel,
                    state,
                )));
        }

        Ok(())
    }

    /// Disconnect from the Keemple cloud.
    ///
    /// Cancels background tasks, logs out, and resets the connection state
    /// to [`Disconnected`](ConnectionState::Disconnected). The hub can be
    /// connected again afterwards.
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.teardown().await;
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Stop the current connection's tasks and log out. Returns whether a
    /// connection was live.
    async fn teardown(&self) -> bool {
        self.inner.cancel.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        let Some(engine) = self.inner.engine.lock().await.take() else {
            return false;
        };
        if let Err(e) = engine.client().logout().await {
            warn!(error = %e, "logout failed (non-fatal)");
        }
        true
    }

    /// One-shot: connect, run closure, disconnect.
    ///
    /// Background polling is disabled; the closure sees the state of the
    /// initial poll cycle.
    pub async fn oneshot<F, Fut, T>(config: HubConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Hub) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.poll_interval = Duration::ZERO;

        let hub = Hub::new(cfg);
        hub.connect().await?;
        let result = f(hub.clone()).await;
        hub.disconnect().await;
        result
    }

    async fn engine(&self) -> Result<Arc<SyncEngine>, CoreError> {
        self.inner
            .engine
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(CoreError::NotConnected)
    }

    // ── Operations ───────────────────────────────────────────────

    /// Send a command to a device.
    ///
    /// Returns the optimistic state written to the cache, if any.
    pub async fn execute(
        &self,
        id: &DeviceId,
        command: DeviceCommand,
    ) -> Result<Option<Arc<DeviceState>>, CoreError> {
        self.engine().await?.set_state(id, command).await
    }

    /// Run a poll cycle now.
    pub async fn refresh(&self) -> Result<PollOutcome, CoreError> {
        self.engine().await?.poll_cycle().await
    }

    /// Re-read a single device.
    pub async fn refresh_device(&self, id: &DeviceId) -> Result<Arc<DeviceState>, CoreError> {
        self.engine().await?.refresh_device(id).await
    }

    /// Refresh the device registry without reconciling state.
    pub async fn sync_registry(&self) -> Result<RegistryDiff, CoreError> {
        self.engine().await?.sync_registry().await
    }

    // ── State observation ────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn state_changes(&self) -> broadcast::Receiver<StateChange> {
        self.inner.cache.changes()
    }

    pub fn registry_changes(&self) -> broadcast::Receiver<Arc<RegistryDiff>> {
        self.inner.registry.changes()
    }

    pub fn states(&self) -> EntityStream<DeviceState> {
        self.inner.cache.subscribe()
    }

    pub fn devices(&self) -> EntityStream<DeviceDescriptor> {
        self.inner.registry.subscribe()
    }

    // ── Snapshot accessors ───────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<DeviceDescriptor>>> {
        self.inner.registry.snapshot()
    }

    pub fn states_snapshot(&self) -> Arc<Vec<Arc<DeviceState>>> {
        self.inner.cache.snapshot()
    }

    pub fn device(&self, id: &DeviceId) -> Option<Arc<DeviceDescriptor>> {
        self.inner.registry.get(id)
    }

    pub fn state(&self, id: &DeviceId) -> Option<Arc<DeviceState>> {
        self.inner.cache.get(id)
    }

    pub fn devices_by_kind(&self, kind: DeviceKind) -> Vec<Arc<DeviceDescriptor>> {
        self.inner.registry.by_kind(kind)
    }

    pub fn devices_by_room(&self, room: &str) -> Vec<Arc<DeviceDescriptor>> {
        self.inner.registry.by_room(room)
    }

    pub fn rooms(&self) -> BTreeMap<String, Vec<Arc<DeviceDescriptor>>> {
        self.inner.registry.rooms()
    }

    // ── Entity views ─────────────────────────────────────────────

    pub fn entity(&self, id: &DeviceId) -> Option<Entity> {
        let descriptor = self.inner.registry.get(id)?;
        let state = self.inner.cache.get(id);
        Some(Entity::new(&descriptor, state.as_deref()))
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.inner
            .registry
            .snapshot()
            .iter()
            .map(|d| Entity::new(d, self.inner.cache.get(&d.device_id).as_deref()))
            .collect()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodic polling. A connection-level failure (rejected credentials,
/// exhausted retries) moves the hub to `Failed`; the next good cycle
/// moves it back to `Connected`.
async fn poll_task(
    engine: Arc<SyncEngine>,
    every: Duration,
    cancel: CancellationToken,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match engine.poll_cycle().await {
                    Ok(PollOutcome::Completed { changed, .. }) => {
                        debug!(changed, "periodic poll complete");
                        state.send_if_modified(|s| {
                            if *s != ConnectionState::Failed {
                                return false;
                            }
                            info!("connection restored");
                            *s = ConnectionState::Connected;
                            true
                        });
                    }
                    Ok(PollOutcome::Skipped) => {}
                    Err(e) => {
                        warn!(operation = "poll", error = %e, "periodic poll failed");
                        if e.is_connection_loss() {
                            state.send_replace(ConnectionState::Failed);
                        }
                    }
                }
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_transport(config: &HubConfig) -> TransportConfig {
    let tls = match &config.tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    };

    TransportConfig {
        tls,
        timeout: config.timeout,
        cookie_jar: None,
        retry: config.retry.clone(),
    }
    .with_cookie_jar()
}
