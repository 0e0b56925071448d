//! # CP-01 Vote Tally
//!
//! Pure aggregation of poll results. Nothing in this crate performs I/O or
//! keeps state; the session model and the bridge call into it.
//!
//! ## Operations
//!
//! - `tally_ballots`: results from individual ballots
//! - `tally_counts`: results from a per-option count map
//! - `reconcile_counts`: recompute counts from roster answer state
//! - `counts_match`: detect drift between a count map and the roster
//! - `voting_progress`: how many students have answered
//!
//! ## Rounding
//!
//! Percentages are integers, rounded half up. `1 of 3` is 33%, `2 of 3` is
//! 67%, `1 of 8` is 13%. With no votes every percentage is 0.
//!
//! ## Usage Example
//!
//! ```
//! use cp_01_vote_tally::tally_ballots;
//! use shared_types::Ballot;
//!
//! let options = vec!["X".to_string(), "Y".to_string()];
//! let report = tally_ballots(&options, &[Ballot::new("Alice", "X")]);
//! assert_eq!(report.total_votes, 1);
//! assert_eq!(report.per_option[0].percentage, 100);
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;

pub use domain::progress::{voting_progress, VotingProgress};
pub use domain::tally::{
    counts_match, percentage, reconcile_counts, tally_ballots, tally_counts,
};
