// keemple-core: device registry, sync engine, and entity adapters between
// keemple-api and consumers (CLI, home-automation hosts).

pub mod config;
pub mod convert;
pub mod entity;
pub mod error;
pub mod hub;
pub mod model;
pub mod registry;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DeviceTypeTable, HubConfig, TlsVerification};
pub use entity::{ClimateEntity, CoverEntity, DeviceInfo, Entity, HvacAction, SwitchEntity};
pub use error::CoreError;
pub use hub::{ConnectionState, Hub};
pub use registry::{DeviceRegistry, RegistryDiff, Renamed};
pub use store::StateCache;
pub use stream::EntityStream;
pub use sync::{PollOutcome, SyncEngine, SyncSettings};

pub use keemple_api::{Credentials, DEFAULT_COUNTRY_CODE, RetryPolicy};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Availability, Capabilities, DeviceCommand, DeviceDescriptor, DeviceId, DeviceKind,
    DeviceState, HvacMode, Reading, StateChange,
};
