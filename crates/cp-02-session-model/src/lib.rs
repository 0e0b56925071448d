//! # CP-02 Session Model
//!
//! The classroom state tree and its transitions.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): pure state, no I/O, no clock
//!   - `Session`: roster, pending queue, blacklist, current poll, countdown,
//!     results flag, chat log, poll history
//!   - `SessionLimits`: validation bounds, loadable from the environment
//!   - `Rejection`: why a transition was refused
//!   - `SnapshotKey`: field-level persistence codec
//!
//! Every transition goes through `Session::apply` (or the method it
//! dispatches to) and returns the `SessionEvent`s it produced. The caller
//! supplies the clock through `ApplyContext`, which keeps the model
//! deterministic under test.
//!
//! ## Usage Example
//!
//! ```
//! use cp_02_session_model::{ApplyContext, Session, SessionLimits};
//! use shared_types::Command;
//!
//! let limits = SessionLimits::default();
//! let ctx = ApplyContext::new(0, &limits);
//! let mut session = Session::new();
//!
//! session
//!     .apply(&Command::RequestAdmission { name: "Sam".into() }, &ctx)
//!     .unwrap();
//! assert_eq!(session.pending().len(), 1);
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;

pub use domain::errors::Rejection;
pub use domain::limits::SessionLimits;
pub use domain::session::{poll_deadline, ApplyContext, PollPhase, Session, DEADLINE_GRACE_MS};
pub use domain::snapshot::{touched_fields, SnapshotKey};
