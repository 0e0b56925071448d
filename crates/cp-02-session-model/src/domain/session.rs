//! # Session State
//!
//! The single owned state tree of a classroom and every transition on it.
//!
//! ## Poll Lifecycle
//!
//! ```text
//!            createPoll                  endPoll / tick→0
//! ┌────────┐ ─────────→ ┌────────┐ ──────────────────→ ┌────────┐
//! │ NoPoll │            │ Active │                     │ Ended  │
//! └────────┘ ←───────── └────────┘ ←────────────────── └────────┘
//!     ↑       clearPoll      ↑          createPoll          │
//!     └──────────────────────┴──────────────────────────────┘
//!                          clearPoll
//! ```
//!
//! ## Invariants
//!
//! - A name is in at most one of {pending, roster, blacklist}, compared
//!   case-insensitively.
//! - Every student with `has_answered` has a `selected_option` and vice versa.
//! - The sum of the current poll's counts equals the number of students
//!   whose answer is a known option.
//! - Transitions either succeed and return their events, or return a
//!   `Rejection` and leave the session untouched.

use serde::{Deserialize, Serialize};
use shared_bus::SessionEvent;
use shared_types::{
    display_name, name_key, same_name, Ballot, ChatMessage, Command, PendingAdmission, Poll,
    PollId, PollSummary, Student, TallyReport, Timestamp,
};
use uuid::Uuid;

use cp_01_vote_tally::{reconcile_counts, tally_counts, voting_progress, VotingProgress};

use super::errors::Rejection;
use super::limits::SessionLimits;

/// Where the current poll is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PollPhase {
    NoPoll,
    Active,
    Ended,
}

/// Inputs every transition may need besides the command itself.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    /// Wall-clock milliseconds.
    pub now: Timestamp,
    pub limits: &'a SessionLimits,
}

impl<'a> ApplyContext<'a> {
    #[must_use]
    pub fn new(now: Timestamp, limits: &'a SessionLimits) -> Self {
        Self { now, limits }
    }
}

/// The classroom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub(crate) current_poll: Option<Poll>,
    pub(crate) roster: Vec<Student>,
    pub(crate) pending: Vec<PendingAdmission>,
    pub(crate) blacklist: Vec<String>,
    pub(crate) remaining_secs: u32,
    pub(crate) results_visible: bool,
    pub(crate) chat: Vec<ChatMessage>,
    pub(crate) history: Vec<PollSummary>,
}

// =============================================================================
// READ ACCESS
// =============================================================================

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_poll(&self) -> Option<&Poll> {
        self.current_poll.as_ref()
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn pending(&self) -> &[PendingAdmission] {
        &self.pending
    }

    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn results_visible(&self) -> bool {
        self.results_visible
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn history(&self) -> &[PollSummary] {
        &self.history
    }

    pub fn student(&self, name: &str) -> Option<&Student> {
        self.roster.iter().find(|s| same_name(&s.name, name))
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.iter().any(|p| same_name(&p.name, name))
    }

    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|b| same_name(b, name))
    }

    /// Lifecycle phase of the current poll.
    pub fn phase(&self) -> PollPhase {
        match &self.current_poll {
            None => PollPhase::NoPoll,
            Some(p) if p.active => PollPhase::Active,
            Some(_) => PollPhase::Ended,
        }
    }

    /// Id of the current poll if it is still accepting votes.
    pub fn active_poll_id(&self) -> Option<PollId> {
        self.current_poll.as_ref().filter(|p| p.active).map(|p| p.id)
    }

    pub fn answered_count(&self) -> u32 {
        let n = self.roster.iter().filter(|s| s.has_answered).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    /// True when the roster is non-empty and every student has answered.
    pub fn all_answered(&self) -> bool {
        !self.roster.is_empty() && self.roster.iter().all(|s| s.has_answered)
    }

    /// True if the current poll is still active at `now` although its
    /// deadline has passed.
    pub fn past_deadline(&self, now: Timestamp) -> bool {
        self.current_poll
            .as_ref()
            .is_some_and(|p| p.active && now >= poll_deadline(p))
    }

    /// Results of the current poll; empty with no poll.
    pub fn tally(&self) -> TallyReport {
        self.current_poll
            .as_ref()
            .map(|p| tally_counts(&p.options, &p.votes))
            .unwrap_or_default()
    }

    pub fn progress(&self) -> VotingProgress {
        let total = u32::try_from(self.roster.len()).unwrap_or(u32::MAX);
        voting_progress(total, self.answered_count())
    }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

impl Session {
    /// Apply a command, returning the events it produced.
    ///
    /// # Errors
    ///
    /// Returns the `Rejection` for the first precondition that failed; the
    /// session is unchanged in that case.
    pub fn apply(
        &mut self,
        command: &Command,
        ctx: &ApplyContext<'_>,
    ) -> Result<Vec<SessionEvent>, Rejection> {
        match command {
            Command::RequestAdmission { name } => self.request_admission(name, ctx),
            Command::Approve { name } => self.approve(name),
            Command::Reject { name } => self.reject(name),
            Command::CreatePoll {
                question,
                options,
                duration,
            } => self.create_poll(question, options, *duration, ctx),
            Command::SubmitVote {
                student_name,
                option,
            } => self.submit_vote(student_name, option, ctx),
            Command::EndPoll {} => self.end_poll(ctx),
            Command::RemoveStudent { name } => self.remove_student(name),
            Command::ClearPoll {} => self.clear_poll(ctx),
            Command::SendMessage {
                author,
                text,
                is_presenter,
            } => self.send_message(author, text, *is_presenter, ctx),
            Command::ResetSession {} => Ok(self.reset()),
        }
    }

    /// Queue a join request.
    pub fn request_admission(
        &mut self,
        name: &str,
        ctx: &ApplyContext<'_>,
    ) -> Result<Vec<SessionEvent>, Rejection> {
        let name = display_name(name);
        let len = name.chars().count();
        if len < ctx.limits.min_name_len {
            return Err(Rejection::NameTooShort {
                min: ctx.limits.min_name_len,
            });
        }
        if len > ctx.limits.max_name_len {
            return Err(Rejection::NameTooLong {
                max: ctx.limits.max_name_len,
            });
        }
        if self.is_blacklisted(name) {
            return Err(Rejection::NameBlacklisted(name.to_string()));
        }
        if self.is_pending(name) {
            return Err(Rejection::AlreadyPending(name.to_string()));
        }
        if self.student(name).is_some() {
            return Err(Rejection::NameTaken(name.to_string()));
        }

        self.pending.push(PendingAdmission::new(name, ctx.now));
        Ok(vec![SessionEvent::AdmissionRequested {
            name: name.to_string(),
            requested_at: ctx.now,
        }])
    }

    /// Admit a pending student, or lift the ban on a blacklisted name.
    pub fn approve(&mut self, name: &str) -> Result<Vec<SessionEvent>, Rejection> {
        if let Some(idx) = self.pending.iter().position(|p| same_name(&p.name, name)) {
            let admission = self.pending.remove(idx);
            self.unblacklist(&admission.name);
            // Another context may have approved the same request already.
            if self.student(&admission.name).is_none() {
                self.roster
                    .push(Student::new(admission.id, admission.name.clone()));
            }
            return Ok(vec![SessionEvent::StudentApproved {
                name: admission.name,
            }]);
        }

        if self.is_blacklisted(name) {
            self.unblacklist(name);
            return Ok(vec![SessionEvent::StudentPardoned {
                name: display_name(name).to_string(),
            }]);
        }

        Err(Rejection::NotPending(display_name(name).to_string()))
    }

    /// Turn a pending student away and blacklist the name.
    pub fn reject(&mut self, name: &str) -> Result<Vec<SessionEvent>, Rejection> {
        let idx = self
            .pending
            .iter()
            .position(|p| same_name(&p.name, name))
            .ok_or_else(|| Rejection::NotPending(display_name(name).to_string()))?;

        let admission = self.pending.remove(idx);
        self.blacklist_name(&admission.name);
        Ok(vec![SessionEvent::StudentRejected {
            name: admission.name,
        }])
    }

    /// Start a new poll, superseding any current one.
    pub fn create_poll(
        &mut self,
        question: &str,
        options: &[String],
        duration: u32,
        ctx: &ApplyContext<'_>,
    ) -> Result<Vec<SessionEvent>, Rejection> {
        let limits = ctx.limits;
        let question = question.trim();
        if question.is_empty() {
            return Err(Rejection::QuestionEmpty);
        }

        if !(limits.min_options..=limits.max_options).contains(&options.len()) {
            return Err(Rejection::OptionCount {
                got: options.len(),
                min: limits.min_options,
                max: limits.max_options,
            });
        }

        let mut labels: Vec<String> = Vec::with_capacity(options.len());
        for option in options {
            let label = option.trim();
            if label.is_empty() {
                return Err(Rejection::EmptyOption);
            }
            if labels.iter().any(|l| l == label) {
                return Err(Rejection::DuplicateOption(label.to_string()));
            }
            labels.push(label.to_string());
        }

        if !limits.duration_allowed(duration) {
            return Err(Rejection::DurationOutOfRange {
                got: duration,
                min: limits.min_duration_secs,
                max: limits.max_duration_secs,
            });
        }

        self.archive_current(ctx);
        for student in &mut self.roster {
            student.reset_answer();
        }

        let poll = Poll::new(question, labels, duration, ctx.now);
        self.current_poll = Some(poll.clone());
        self.remaining_secs = duration;
        self.results_visible = false;

        Ok(vec![SessionEvent::PollStarted { poll }])
    }

    /// Record a student's single ballot for the active poll.
    ///
    /// A poll past its deadline takes no more votes, even if nothing has
    /// closed it yet.
    pub fn submit_vote(
        &mut self,
        student_name: &str,
        option: &str,
        ctx: &ApplyContext<'_>,
    ) -> Result<Vec<SessionEvent>, Rejection> {
        let option = option.trim();
        let poll = self
            .current_poll
            .as_mut()
            .filter(|p| p.active)
            .ok_or(Rejection::NoActivePoll)?;
        if ctx.now >= poll_deadline(poll) {
            return Err(Rejection::PollExpired);
        }
        if !poll.has_option(option) {
            return Err(Rejection::UnknownOption(option.to_string()));
        }

        let student = self
            .roster
            .iter_mut()
            .find(|s| same_name(&s.name, student_name))
            .ok_or_else(|| Rejection::UnknownStudent(display_name(student_name).to_string()))?;
        if student.has_answered {
            return Err(Rejection::AlreadyAnswered(student.name.clone()));
        }

        student.record_answer(option);
        *poll.votes.entry(option.to_string()).or_insert(0) += 1;

        Ok(vec![SessionEvent::VoteRecorded {
            poll_id: poll.id,
            student_name: student.name.clone(),
            option: option.to_string(),
        }])
    }

    /// Close the active poll and reveal results.
    pub fn end_poll(&mut self, ctx: &ApplyContext<'_>) -> Result<Vec<SessionEvent>, Rejection> {
        let poll = self
            .current_poll
            .as_mut()
            .filter(|p| p.active)
            .ok_or(Rejection::NoActivePoll)?;

        poll.active = false;
        let event = SessionEvent::PollEnded {
            poll_id: poll.id,
            votes: poll.votes.clone(),
        };
        self.remaining_secs = 0;
        self.results_visible = true;
        self.archive_current(ctx);

        Ok(vec![event])
    }

    /// Evict a student, blacklist the name and repair the tally.
    pub fn remove_student(&mut self, name: &str) -> Result<Vec<SessionEvent>, Rejection> {
        let idx = self
            .roster
            .iter()
            .position(|s| same_name(&s.name, name))
            .ok_or_else(|| Rejection::UnknownStudent(display_name(name).to_string()))?;

        let student = self.roster.remove(idx);
        self.blacklist_name(&student.name);
        self.reconcile_tally();

        Ok(vec![SessionEvent::StudentRemoved { name: student.name }])
    }

    /// Return to "no poll".
    pub fn clear_poll(&mut self, ctx: &ApplyContext<'_>) -> Result<Vec<SessionEvent>, Rejection> {
        if self.current_poll.is_none() {
            return Err(Rejection::NothingToClear);
        }
        self.archive_current(ctx);

        let poll_id = self.current_poll.take().map(|p| p.id);
        for student in &mut self.roster {
            student.reset_answer();
        }
        self.remaining_secs = 0;
        self.results_visible = false;

        Ok(vec![SessionEvent::PollCleared { poll_id }])
    }

    /// Append to the chat log.
    pub fn send_message(
        &mut self,
        author: &str,
        text: &str,
        is_presenter: bool,
        ctx: &ApplyContext<'_>,
    ) -> Result<Vec<SessionEvent>, Rejection> {
        let author = display_name(author);
        if author.is_empty() {
            return Err(Rejection::AuthorEmpty);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(Rejection::MessageEmpty);
        }
        if text.chars().count() > ctx.limits.max_message_len {
            return Err(Rejection::MessageTooLong {
                max: ctx.limits.max_message_len,
            });
        }

        let message = ChatMessage {
            id: Uuid::new_v4(),
            author: author.to_string(),
            is_presenter,
            text: text.to_string(),
            posted_at: ctx.now,
        };
        self.chat.push(message.clone());
        Ok(vec![SessionEvent::MessagePosted { message }])
    }

    /// Wipe everything.
    pub fn reset(&mut self) -> Vec<SessionEvent> {
        *self = Self::default();
        vec![SessionEvent::SessionReset]
    }

    /// Advance the countdown of poll `poll_id` by one second.
    ///
    /// Reaching zero ends the poll, so the returned events are either
    /// `[tick]` or `[tick, pollEnded]`.
    ///
    /// # Errors
    ///
    /// `Rejection::StaleTick` if `poll_id` is not the active poll.
    pub fn countdown_tick(
        &mut self,
        poll_id: PollId,
        ctx: &ApplyContext<'_>,
    ) -> Result<Vec<SessionEvent>, Rejection> {
        if self.active_poll_id() != Some(poll_id) {
            return Err(Rejection::StaleTick);
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        let mut events = vec![SessionEvent::Tick {
            poll_id,
            remaining: self.remaining_secs,
        }];
        if self.remaining_secs == 0 {
            events.extend(self.end_poll(ctx)?);
        }
        Ok(events)
    }
}

// =============================================================================
// RECONCILIATION
// =============================================================================

impl Session {
    /// Merge a persisted ballot into roster answer state.
    ///
    /// Returns true if a student's answer changed. Counts are not touched;
    /// call `reconcile_tally` afterwards.
    pub fn absorb_ballot(&mut self, poll_id: PollId, ballot: &Ballot) -> bool {
        let Some(poll) = self.current_poll.as_ref().filter(|p| p.id == poll_id) else {
            return false;
        };
        if !poll.has_option(&ballot.option) {
            return false;
        }
        match self
            .roster
            .iter_mut()
            .find(|s| same_name(&s.name, &ballot.student_name))
        {
            Some(student) if !student.has_answered => {
                student.record_answer(ballot.option.clone());
                true
            }
            _ => false,
        }
    }

    /// Recompute the current poll's counts from the roster.
    ///
    /// Returns true if the counts changed.
    pub fn reconcile_tally(&mut self) -> bool {
        let Some(poll) = self.current_poll.as_mut() else {
            return false;
        };
        let counts = reconcile_counts(&poll.options, &self.roster);
        let changed = counts != poll.votes;
        poll.votes = counts;
        changed
    }

    /// Restore name-set exclusivity after merging state written by several
    /// contexts. The blacklist wins over the roster, and both win over the
    /// pending queue.
    pub fn normalize(&mut self) {
        let banned: Vec<String> = self.blacklist.iter().map(|b| name_key(b)).collect();
        self.roster.retain(|s| !banned.contains(&name_key(&s.name)));

        let admitted: Vec<String> = self.roster.iter().map(|s| name_key(&s.name)).collect();
        self.pending.retain(|p| {
            let key = name_key(&p.name);
            !banned.contains(&key) && !admitted.contains(&key)
        });

        let mut seen = Vec::new();
        self.roster.retain(|s| {
            let key = name_key(&s.name);
            if seen.contains(&key) {
                return false;
            }
            seen.push(key);
            true
        });

        for student in &mut self.roster {
            if student.has_answered != student.selected_option.is_some() {
                student.reset_answer();
            }
        }
    }

    fn blacklist_name(&mut self, name: &str) {
        if !self.is_blacklisted(name) {
            self.blacklist.push(display_name(name).to_string());
        }
    }

    fn unblacklist(&mut self, name: &str) {
        self.blacklist.retain(|b| !same_name(b, name));
    }

    fn archive_current(&mut self, ctx: &ApplyContext<'_>) {
        if !ctx.limits.retain_history {
            return;
        }
        let Some(poll) = self.current_poll.as_ref() else {
            return;
        };
        if self.history.iter().any(|h| h.poll_id == poll.id) {
            return;
        }
        self.history.push(PollSummary {
            poll_id: poll.id,
            question: poll.question.clone(),
            report: tally_counts(&poll.options, &poll.votes),
            created_at: poll.created_at,
            closed_at: ctx.now,
        });
    }
}

/// Slack past the configured duration before a poll counts as overdue.
/// Covers countdown drift and clock skew between contexts.
pub const DEADLINE_GRACE_MS: Timestamp = 2_000;

/// Wall-clock time after which `poll` takes no more votes.
#[must_use]
pub fn poll_deadline(poll: &Poll) -> Timestamp {
    poll.created_at
        .saturating_add(Timestamp::from(poll.duration_secs) * 1_000)
        .saturating_add(DEADLINE_GRACE_MS)
}
