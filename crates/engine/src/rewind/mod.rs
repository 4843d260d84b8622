//! Timeline storage, rewind pacing, phase notifications and deferred entity
//! creation.

mod driver;
mod observers;
mod pending;
mod timeline;

pub use driver::{RewindConfig, RewindDriver, RewindPhase};
pub use observers::{ObserverId, ObserverList, RewindEvent};
pub use pending::{DeferredAction, PendingCreations, PumpReport};
pub use timeline::{Timeline, TimelineError};
