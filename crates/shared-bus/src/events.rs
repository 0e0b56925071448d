//! # Session Events
//!
//! Defines every event an engine emits after a successful transition.
//! Events are internally tagged on the wire:
//!
//! ```json
//! { "event": "tick", "pollId": "…", "remaining": 12 }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared_types::{ChatMessage, Poll, PollId, Timestamp, VoteCounts};

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    // =========================================================================
    // ADMISSION CONTROL
    // =========================================================================
    /// A new pending admission was queued.
    #[serde(rename_all = "camelCase")]
    AdmissionRequested { name: String, requested_at: Timestamp },

    /// A pending student joined the roster.
    StudentApproved { name: String },

    /// A pending student was turned away and blacklisted.
    StudentRejected { name: String },

    /// A blacklisted name was cleared and may request admission again.
    StudentPardoned { name: String },

    /// A student was evicted from the roster and blacklisted.
    StudentRemoved { name: String },

    // =========================================================================
    // POLL LIFECYCLE
    // =========================================================================
    /// A new poll became active.
    PollStarted { poll: Poll },

    /// A ballot was accepted.
    #[serde(rename_all = "camelCase")]
    VoteRecorded {
        poll_id: PollId,
        student_name: String,
        option: String,
    },

    /// One second of the countdown elapsed.
    #[serde(rename_all = "camelCase")]
    Tick { poll_id: PollId, remaining: u32 },

    /// The poll closed; results are now visible.
    #[serde(rename_all = "camelCase")]
    PollEnded { poll_id: PollId, votes: VoteCounts },

    /// The session returned to "no poll".
    #[serde(rename_all = "camelCase")]
    PollCleared { poll_id: Option<PollId> },

    // =========================================================================
    // CHAT & SESSION
    // =========================================================================
    /// A chat message was appended.
    MessagePosted { message: ChatMessage },

    /// The whole session was wiped.
    SessionReset,
}

impl SessionEvent {
    /// Get the kind of this event (its wire name).
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AdmissionRequested { .. } => EventKind::AdmissionRequested,
            Self::StudentApproved { .. } => EventKind::StudentApproved,
            Self::StudentRejected { .. } => EventKind::StudentRejected,
            Self::StudentPardoned { .. } => EventKind::StudentPardoned,
            Self::StudentRemoved { .. } => EventKind::StudentRemoved,
            Self::PollStarted { .. } => EventKind::PollStarted,
            Self::VoteRecorded { .. } => EventKind::VoteRecorded,
            Self::Tick { .. } => EventKind::Tick,
            Self::PollEnded { .. } => EventKind::PollEnded,
            Self::PollCleared { .. } => EventKind::PollCleared,
            Self::MessagePosted { .. } => EventKind::MessagePosted,
            Self::SessionReset => EventKind::SessionReset,
        }
    }

    /// Get the topic for this event (for coarse filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        self.kind().topic()
    }
}

/// Fine-grained event identity, one per `SessionEvent` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    AdmissionRequested,
    StudentApproved,
    StudentRejected,
    StudentPardoned,
    StudentRemoved,
    PollStarted,
    VoteRecorded,
    Tick,
    PollEnded,
    PollCleared,
    MessagePosted,
    SessionReset,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 12] = [
        Self::AdmissionRequested,
        Self::StudentApproved,
        Self::StudentRejected,
        Self::StudentPardoned,
        Self::StudentRemoved,
        Self::PollStarted,
        Self::VoteRecorded,
        Self::Tick,
        Self::PollEnded,
        Self::PollCleared,
        Self::MessagePosted,
        Self::SessionReset,
    ];

    /// Wire name, as used by named subscriptions and event-marker keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdmissionRequested => "admissionRequested",
            Self::StudentApproved => "studentApproved",
            Self::StudentRejected => "studentRejected",
            Self::StudentPardoned => "studentPardoned",
            Self::StudentRemoved => "studentRemoved",
            Self::PollStarted => "pollStarted",
            Self::VoteRecorded => "voteRecorded",
            Self::Tick => "tick",
            Self::PollEnded => "pollEnded",
            Self::PollCleared => "pollCleared",
            Self::MessagePosted => "messagePosted",
            Self::SessionReset => "sessionReset",
        }
    }

    /// Coarse topic this kind belongs to.
    #[must_use]
    pub fn topic(self) -> EventTopic {
        match self {
            Self::AdmissionRequested
            | Self::StudentApproved
            | Self::StudentRejected
            | Self::StudentPardoned
            | Self::StudentRemoved => EventTopic::Admission,
            Self::PollStarted | Self::VoteRecorded | Self::PollEnded | Self::PollCleared => {
                EventTopic::Poll
            }
            Self::Tick => EventTopic::Countdown,
            Self::MessagePosted => EventTopic::Chat,
            Self::SessionReset => EventTopic::Session,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event name: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Join requests, approvals, rejections, removals.
    Admission,
    /// Poll start, votes, end, clear.
    Poll,
    /// Countdown ticks.
    Countdown,
    /// Chat log.
    Chat,
    /// Whole-session resets.
    Session,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<EventKind>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            kinds: Vec::new(),
        }
    }

    /// Create a filter for specific event kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            topics: Vec::new(),
            kinds,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &SessionEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let kind_match = self.kinds.is_empty() || self.kinds.contains(&event.kind());

        topic_match && kind_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tick(remaining: u32) -> SessionEvent {
        SessionEvent::Tick {
            poll_id: Uuid::nil(),
            remaining,
        }
    }

    #[test]
    fn test_event_kind_mapping() {
        let event = tick(5);
        assert_eq!(event.kind(), EventKind::Tick);
        assert_eq!(event.topic(), EventTopic::Countdown);

        let event = SessionEvent::StudentApproved { name: "Sam".into() };
        assert_eq!(event.topic(), EventTopic::Admission);
    }

    #[test]
    fn test_kind_names_round_trip_through_from_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert!("showResults".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_serde_tag_matches_kind_name() {
        let event = tick(3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], EventKind::Tick.as_str());
        assert_eq!(json["remaining"], 3);

        let json = serde_json::to_value(SessionEvent::SessionReset).unwrap();
        assert_eq!(json["event"], "sessionReset");
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&tick(1)));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Admission]);
        assert!(filter.matches(&SessionEvent::StudentRejected { name: "Sam".into() }));
        assert!(!filter.matches(&tick(1)));
    }

    #[test]
    fn test_filter_by_kind() {
        let filter = EventFilter::kinds(vec![EventKind::PollEnded, EventKind::Tick]);
        assert!(filter.matches(&tick(1)));
        assert!(!filter.matches(&SessionEvent::PollCleared { poll_id: None }));
    }
}
