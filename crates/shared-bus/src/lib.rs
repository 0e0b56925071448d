//! # Shared Bus - Session Event Bus
//!
//! Carries every session change from the engine that made it to the
//! observers that render it.
//!
//! ## Delivery Paths
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐  recv()/stream  ┌──────────────┐
//! │ Sync Engine  │ ────────────→ │  Event Bus   │ ──────────────→ │ Subscriptions│
//! │              │               └──────────────┘                 └──────────────┘
//! │              │   dispatch()  ┌──────────────┐   Fn(&event)    ┌──────────────┐
//! │              │ ────────────→ │  Listeners   │ ──────────────→ │ UI handlers  │
//! └──────────────┘               └──────────────┘                 └──────────────┘
//! ```
//!
//! - **Event Bus:** `tokio::sync::broadcast` fan-out with kind/topic filters.
//! - **Listener Registry:** named callbacks, one registration per
//!   (event kind, handler) pair.
//! - **Replay Guard:** time-bounded cache of event-marker ids so a marker
//!   replayed from another context is delivered at most once, and stale
//!   markers are never delivered.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod listeners;
pub mod publisher;
pub mod replay_guard;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventKind, EventTopic, SessionEvent};
pub use listeners::{Handler, ListenerRegistry};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use replay_guard::{ReplayError, TimeBoundedReplayGuard};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
