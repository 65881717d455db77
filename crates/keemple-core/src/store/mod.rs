// ── Reactive state storage ──
//
// Concurrent device storage with push-based change notification.

mod collection;
mod state_cache;

pub(crate) use collection::EntityCollection;
pub use state_cache::StateCache;
