//! # Core Domain Entities
//!
//! Defines the classroom entities held by a session.
//!
//! ## Clusters
//!
//! - **Poll**: `Poll`, `Ballot`, `TallyReport`, `OptionResult`, `PollSummary`
//! - **Roster**: `Student`, `PendingAdmission`
//! - **Chat**: `ChatMessage`
//! - **Contexts**: `ContextId`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Milliseconds since the UNIX epoch.
pub type Timestamp = u64;

/// Identity of a poll.
pub type PollId = Uuid;

/// Per-option vote counts keyed by option label.
pub type VoteCounts = BTreeMap<String, u32>;

// =============================================================================
// CLUSTER A: CONTEXTS
// =============================================================================

/// Identity of an execution context (one tab, one process, one node).
///
/// Every write to the shared store is tagged with the context that made it,
/// so a context can ignore its own change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub Uuid);

impl ContextId {
    /// Create a fresh random context identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// =============================================================================
// CLUSTER B: THE POLL
// =============================================================================

/// A timed multiple-choice question.
///
/// Every option label is present in `votes`, initialised to zero, and no
/// other key is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    /// Option labels in presentation order.
    pub options: Vec<String>,
    pub votes: VoteCounts,
    pub active: bool,
    pub created_at: Timestamp,
    /// Configured countdown in seconds.
    pub duration_secs: u32,
}

impl Poll {
    /// Create a new active poll with a zeroed count for every option.
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        duration_secs: u32,
        created_at: Timestamp,
    ) -> Self {
        let votes = options.iter().map(|o| (o.clone(), 0)).collect();
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            options,
            votes,
            active: true,
            created_at,
            duration_secs,
        }
    }

    /// Returns true if `option` is one of this poll's labels.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Sum of the counts of all known options.
    pub fn total_votes(&self) -> u32 {
        self.options
            .iter()
            .map(|o| self.votes.get(o).copied().unwrap_or(0))
            .sum()
    }
}

/// One student's recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub student_name: String,
    pub option: String,
}

impl Ballot {
    pub fn new(student_name: impl Into<String>, option: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            option: option.into(),
        }
    }
}

/// Result line for a single option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResult {
    pub option: String,
    pub votes: u32,
    /// Rounded share of the total, 0..=100.
    pub percentage: u8,
}

/// Aggregated results of a poll, in option order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyReport {
    pub total_votes: u32,
    pub per_option: Vec<OptionResult>,
}

impl TallyReport {
    /// Votes recorded for `option`, zero if the option is unknown.
    pub fn votes_for(&self, option: &str) -> u32 {
        self.per_option
            .iter()
            .find(|r| r.option == option)
            .map_or(0, |r| r.votes)
    }
}

/// Closed poll kept in the session history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub poll_id: PollId,
    pub question: String,
    pub report: TallyReport,
    pub created_at: Timestamp,
    pub closed_at: Timestamp,
}

// =============================================================================
// CLUSTER C: THE ROSTER
// =============================================================================

/// An approved participant.
///
/// `selected_option` is `Some` exactly when `has_answered` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub has_answered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
}

impl Student {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            has_answered: false,
            selected_option: None,
        }
    }

    /// Record the student's answer for the current poll.
    pub fn record_answer(&mut self, option: impl Into<String>) {
        self.has_answered = true;
        self.selected_option = Some(option.into());
    }

    /// Forget any answer, ready for the next poll.
    pub fn reset_answer(&mut self) {
        self.has_answered = false;
        self.selected_option = None;
    }
}

/// A join request waiting for the presenter's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAdmission {
    pub id: Uuid,
    pub name: String,
    pub requested_at: Timestamp,
}

impl PendingAdmission {
    pub fn new(name: impl Into<String>, requested_at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            requested_at,
        }
    }
}

// =============================================================================
// CLUSTER D: CHAT
// =============================================================================

/// An entry in the append-only chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub author: String,
    pub is_presenter: bool,
    pub text: String,
    pub posted_at: Timestamp,
}
