//! Per-poll memory of who has voted.
//!
//! Independent of roster answer state, so a vote stays counted once even if
//! a resync briefly loses the student's answer.

use cp_02_session_model::Session;
use shared_types::{name_key, PollId};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct BallotGuard {
    poll_id: Option<PollId>,
    voters: HashSet<String>,
}

impl BallotGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_id(&self) -> Option<PollId> {
        self.poll_id
    }

    /// Forget everything and start tracking `poll_id`.
    pub fn reset(&mut self, poll_id: Option<PollId>) {
        self.poll_id = poll_id;
        self.voters.clear();
    }

    /// Remember that `student_name` voted in `poll_id`.
    ///
    /// Returns false if they were already remembered.
    pub fn record(&mut self, poll_id: PollId, student_name: &str) -> bool {
        if self.poll_id != Some(poll_id) {
            self.reset(Some(poll_id));
        }
        self.voters.insert(name_key(student_name))
    }

    pub fn contains(&self, poll_id: PollId, student_name: &str) -> bool {
        self.poll_id == Some(poll_id) && self.voters.contains(&name_key(student_name))
    }

    /// Align with a freshly synchronised session.
    ///
    /// Voters are only ever added while the poll stays the same.
    pub fn sync_from(&mut self, session: &Session) {
        let poll_id = session.current_poll().map(|p| p.id);
        if self.poll_id != poll_id {
            self.reset(poll_id);
        }
        if poll_id.is_some() {
            for student in session.roster().iter().filter(|s| s.has_answered) {
                self.voters.insert(name_key(&student.name));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }
}
