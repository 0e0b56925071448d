//! Field-level snapshot codec.
//!
//! A persisted session is a set of independent keys, one per field, each
//! holding a JSON value. An absent key means the field's default.

use serde::{Deserialize, Serialize};
use shared_bus::SessionEvent;

use super::session::Session;

/// One persisted field of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotKey {
    Roster,
    PendingAdmissions,
    Blacklist,
    CurrentPoll,
    RemainingTime,
    ResultsVisible,
    ChatLog,
    PollHistory,
}

impl SnapshotKey {
    pub const ALL: [SnapshotKey; 8] = [
        Self::Roster,
        Self::PendingAdmissions,
        Self::Blacklist,
        Self::CurrentPoll,
        Self::RemainingTime,
        Self::ResultsVisible,
        Self::ChatLog,
        Self::PollHistory,
    ];

    /// Key suffix under the store prefix.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roster => "roster",
            Self::PendingAdmissions => "pending-admissions",
            Self::Blacklist => "blacklist",
            Self::CurrentPoll => "current-poll",
            Self::RemainingTime => "remaining-time",
            Self::ResultsVisible => "results-visible",
            Self::ChatLog => "chat-log",
            Self::PollHistory => "poll-history",
        }
    }

    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == suffix)
    }
}

/// Fields that may have changed after `event` was emitted.
#[must_use]
pub fn touched_fields(event: &SessionEvent) -> &'static [SnapshotKey] {
    use SnapshotKey::*;
    match event {
        SessionEvent::AdmissionRequested { .. } => &[PendingAdmissions],
        SessionEvent::StudentApproved { .. } => &[PendingAdmissions, Roster, Blacklist],
        SessionEvent::StudentRejected { .. } => &[PendingAdmissions, Blacklist],
        SessionEvent::StudentPardoned { .. } => &[Blacklist],
        SessionEvent::StudentRemoved { .. } => &[Roster, Blacklist, CurrentPoll],
        SessionEvent::VoteRecorded { .. } => &[CurrentPoll, Roster],
        SessionEvent::Tick { .. } => &[RemainingTime],
        SessionEvent::PollStarted { .. }
        | SessionEvent::PollEnded { .. }
        | SessionEvent::PollCleared { .. } => &[
            CurrentPoll,
            Roster,
            RemainingTime,
            ResultsVisible,
            PollHistory,
        ],
        SessionEvent::MessagePosted { .. } => &[ChatLog],
        SessionEvent::SessionReset => &SnapshotKey::ALL,
    }
}

impl Session {
    /// Serialize one field.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures.
    pub fn encode_field(&self, key: SnapshotKey) -> Result<String, serde_json::Error> {
        match key {
            SnapshotKey::Roster => serde_json::to_string(&self.roster),
            SnapshotKey::PendingAdmissions => serde_json::to_string(&self.pending),
            SnapshotKey::Blacklist => serde_json::to_string(&self.blacklist),
            SnapshotKey::CurrentPoll => serde_json::to_string(&self.current_poll),
            SnapshotKey::RemainingTime => serde_json::to_string(&self.remaining_secs),
            SnapshotKey::ResultsVisible => serde_json::to_string(&self.results_visible),
            SnapshotKey::ChatLog => serde_json::to_string(&self.chat),
            SnapshotKey::PollHistory => serde_json::to_string(&self.history),
        }
    }

    /// Overwrite one field from its persisted JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error and leaves the field unchanged when `raw` is
    /// not valid for that field.
    pub fn decode_field(&mut self, key: SnapshotKey, raw: &str) -> Result<(), serde_json::Error> {
        match key {
            SnapshotKey::Roster => self.roster = serde_json::from_str(raw)?,
            SnapshotKey::PendingAdmissions => self.pending = serde_json::from_str(raw)?,
            SnapshotKey::Blacklist => self.blacklist = serde_json::from_str(raw)?,
            SnapshotKey::CurrentPoll => self.current_poll = serde_json::from_str(raw)?,
            SnapshotKey::RemainingTime => self.remaining_secs = serde_json::from_str(raw)?,
            SnapshotKey::ResultsVisible => self.results_visible = serde_json::from_str(raw)?,
            SnapshotKey::ChatLog => self.chat = serde_json::from_str(raw)?,
            SnapshotKey::PollHistory => self.history = serde_json::from_str(raw)?,
        }
        Ok(())
    }

    /// Reset one field to its default, as for an absent key.
    pub fn clear_field(&mut self, key: SnapshotKey) {
        let blank = Self::default();
        match key {
            SnapshotKey::Roster => self.roster = blank.roster,
            SnapshotKey::PendingAdmissions => self.pending = blank.pending,
            SnapshotKey::Blacklist => self.blacklist = blank.blacklist,
            SnapshotKey::CurrentPoll => self.current_poll = blank.current_poll,
            SnapshotKey::RemainingTime => self.remaining_secs = blank.remaining_secs,
            SnapshotKey::ResultsVisible => self.results_visible = blank.results_visible,
            SnapshotKey::ChatLog => self.chat = blank.chat,
            SnapshotKey::PollHistory => self.history = blank.history,
        }
    }
}
