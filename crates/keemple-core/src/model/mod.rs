// ── Domain model ──
//
// Canonical types shared by the registry, the sync engine, and the
// entity adapters. Wire types from keemple-api never leak past convert.rs.

pub mod command;
pub mod device;
pub mod device_id;
pub mod state;

pub use command::{DeviceCommand, HvacMode};
pub use device::{Capabilities, DeviceDescriptor, DeviceKind};
pub use device_id::DeviceId;
pub use state::{Availability, DeviceState, Reading, StateChange};
