//! Ports layer: what the engine needs from the outside world.

pub mod outbound;

pub use outbound::{SharedStore, StorageChange, StoreError, SystemTimeSource, TimeSource};
