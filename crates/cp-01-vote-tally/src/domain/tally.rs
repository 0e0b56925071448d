//! Result aggregation and count reconciliation.

use shared_types::{Ballot, OptionResult, Student, TallyReport, VoteCounts};

/// Share of `votes` in `total` as a whole percentage, rounded half up.
///
/// Returns 0 when `total` is 0.
#[must_use]
pub fn percentage(votes: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let votes = u64::from(votes.min(total));
    let total = u64::from(total);
    // round(votes * 100 / total) without floating point
    let pct = (votes * 200 + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

fn report_from(options: &[String], counts: impl Fn(&str) -> u32) -> TallyReport {
    let votes: Vec<u32> = options.iter().map(|o| counts(o)).collect();
    let total_votes = votes.iter().sum();

    let per_option = options
        .iter()
        .zip(votes)
        .map(|(option, votes)| OptionResult {
            option: option.clone(),
            votes,
            percentage: percentage(votes, total_votes),
        })
        .collect();

    TallyReport {
        total_votes,
        per_option,
    }
}

/// Aggregate individual ballots.
///
/// Ballots naming an option outside `options` are ignored and do not count
/// towards the total.
#[must_use]
pub fn tally_ballots(options: &[String], ballots: &[Ballot]) -> TallyReport {
    report_from(options, |option| {
        let n = ballots.iter().filter(|b| b.option == option).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    })
}

/// Aggregate a per-option count map.
///
/// Keys that are not option labels are ignored; missing labels count as 0.
#[must_use]
pub fn tally_counts(options: &[String], counts: &VoteCounts) -> TallyReport {
    report_from(options, |option| counts.get(option).copied().unwrap_or(0))
}

/// Recompute the count map from roster answer state.
///
/// The result holds exactly one entry per option. A student counts when
/// they have answered with a known option.
#[must_use]
pub fn reconcile_counts(options: &[String], roster: &[Student]) -> VoteCounts {
    let mut counts: VoteCounts = options.iter().map(|o| (o.clone(), 0)).collect();
    for student in roster.iter().filter(|s| s.has_answered) {
        if let Some(count) = student
            .selected_option
            .as_deref()
            .and_then(|o| counts.get_mut(o))
        {
            *count += 1;
        }
    }
    counts
}

/// True if `counts` already equals what the roster implies.
#[must_use]
pub fn counts_match(options: &[String], counts: &VoteCounts, roster: &[Student]) -> bool {
    reconcile_counts(options, roster) == *counts
}
