//! Domain layer for the vote tally.

pub mod progress;
pub mod tally;
