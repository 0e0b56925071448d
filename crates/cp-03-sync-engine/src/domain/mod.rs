//! Domain layer for the sync engine: key layout, persisted records and
//! duplicate-vote memory.

pub mod ballot_guard;
pub mod keys;
pub mod records;

pub use ballot_guard::BallotGuard;
pub use keys::{KeyKind, KeyLayout};
pub use records::{BallotRecord, EventMarker};
