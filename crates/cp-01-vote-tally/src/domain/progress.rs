//! Voting progress for the presenter's dashboard.

use serde::{Deserialize, Serialize};

use super::tally::percentage;

/// How far the class is through the current poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingProgress {
    pub voted: u32,
    pub total: u32,
    pub remaining: u32,
    pub completion_percentage: u8,
    /// True once every student has voted. Never true for an empty class.
    pub is_complete: bool,
}

/// Progress of `voted` students out of `total`.
///
/// `voted` is clamped to `total`.
#[must_use]
pub fn voting_progress(total: u32, voted: u32) -> VotingProgress {
    let voted = voted.min(total);
    VotingProgress {
        voted,
        total,
        remaining: total - voted,
        completion_percentage: percentage(voted, total),
        is_complete: total > 0 && voted == total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_progress() {
        let p = voting_progress(3, 2);
        assert_eq!(p.remaining, 1);
        assert_eq!(p.completion_percentage, 67);
        assert!(!p.is_complete);
    }

    #[test]
    fn test_complete_progress() {
        let p = voting_progress(4, 4);
        assert!(p.is_complete);
        assert_eq!(p.completion_percentage, 100);
    }

    #[test]
    fn test_empty_class_is_never_complete() {
        let p = voting_progress(0, 0);
        assert!(!p.is_complete);
        assert_eq!(p.completion_percentage, 0);
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(voting_progress(2, 1)).unwrap();
        assert_eq!(json["completionPercentage"], 50);
        assert_eq!(json["isComplete"], false);
    }
}
