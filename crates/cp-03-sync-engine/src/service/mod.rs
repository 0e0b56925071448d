//! Service layer: the engine actor, its handle and its timers.

mod engine;
mod handle;
mod timers;

pub use engine::SyncEngine;
pub use handle::{EngineError, EngineHandle};
