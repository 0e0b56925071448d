//! # CP-03 Sync Engine
//!
//! Keeps one context's session in step with every other context of the same
//! classroom through a shared key-value store.
//!
//! ## Purpose
//!
//! Each context runs one engine. The engine owns the context's `Session`,
//! applies submitted commands, persists what changed, tells other contexts
//! what happened, and folds their changes back in.
//!
//! ## Guarantees
//!
//! | Concern | Mechanism |
//! |---------|-----------|
//! | Commands applied one at a time | Single actor task per context |
//! | A vote counts once | `BallotGuard` plus per-ballot store keys |
//! | Concurrent votes are never lost | Ballots overlaid on every resync |
//! | A poll ends once | Countdown and auto-close owned by the creating context |
//! | Remote events delivered at most once | `TimeBoundedReplayGuard` on marker ids |
//! | Storage faults are survivable | Failed writes stay local and are retried |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/memory_store.rs - process-local SharedStore           │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - SharedStore, TimeSource                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service/engine.rs  - SyncEngine actor                          │
//! │  service/handle.rs  - EngineHandle                              │
//! │  service/timers.rs  - countdown and auto-close timers           │
//! │  domain/keys.rs     - store key layout                          │
//! │  domain/records.rs  - BallotRecord, EventMarker                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let store = InMemorySharedStore::new();
//! let (engine, _task) = SyncEngine::spawn(Arc::new(store), EngineConfig::default())?;
//!
//! engine.submit(Command::RequestAdmission { name: "Sam".into() })?;
//! engine.flush().await?;
//! assert!(engine.snapshot().is_pending("Sam"));
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemorySharedStore;
pub use config::{ConfigError, EngineConfig};
pub use domain::{BallotGuard, BallotRecord, EventMarker, KeyKind, KeyLayout};
pub use ports::{SharedStore, StorageChange, StoreError, SystemTimeSource, TimeSource};
pub use service::{EngineError, EngineHandle, SyncEngine};
