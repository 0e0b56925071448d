//! # CP-04 Context Bridge
//!
//! The thin surface presentational code uses. A bridge wraps one context's
//! engine handle and offers:
//!
//! | Need | Method |
//! |------|--------|
//! | Change the session | `submit`, `submit_named` |
//! | React to events | `on` / `off`, `listen`, `subscribe`, `events` |
//! | Read state | `snapshot`, `watch`, `tally`, `progress`, `phase`, `chat_messages` |
//!
//! Commands never fail at this boundary beyond "the engine is gone"; the
//! engine drops invalid ones.
//!
//! ```rust,ignore
//! let bridge = ContextBridge::new(engine);
//! let _guard = bridge.listen(EventKind::PollEnded, |event| render_results(event));
//! bridge.submit_named("submitVote", json!({ "studentName": "Sam", "option": "B" }));
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bridge;
mod errors;
mod listener;

pub use bridge::ContextBridge;
pub use errors::BridgeError;
pub use listener::ListenerGuard;
