//! Shared-store key layout.
//!
//! ```text
//! <prefix><field>                  snapshot field, e.g. classpoll:roster
//! <prefix>ballot:<poll>:<name>     one accepted ballot
//! <prefix>event:<eventName>        latest event marker of that kind
//! ```

use cp_02_session_model::SnapshotKey;
use shared_bus::EventKind;
use shared_types::{name_key, PollId};
use uuid::Uuid;

const BALLOT: &str = "ballot:";
const EVENT: &str = "event:";

/// What a store key refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    Field(SnapshotKey),
    Ballot { poll_id: PollId },
    Event(EventKind),
    /// Under our prefix but not recognised.
    Unknown,
    /// Outside our prefix.
    Foreign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn field(&self, key: SnapshotKey) -> String {
        format!("{}{}", self.prefix, key.as_str())
    }

    pub fn ballot(&self, poll_id: PollId, student_name: &str) -> String {
        format!("{}{}", self.ballot_prefix(poll_id), name_key(student_name))
    }

    /// Prefix of every ballot of one poll.
    pub fn ballot_prefix(&self, poll_id: PollId) -> String {
        format!("{}{BALLOT}{}:", self.prefix, poll_id.simple())
    }

    /// Prefix of every ballot of every poll.
    pub fn all_ballots_prefix(&self) -> String {
        format!("{}{BALLOT}", self.prefix)
    }

    pub fn event(&self, kind: EventKind) -> String {
        format!("{}{EVENT}{}", self.prefix, kind.as_str())
    }

    pub fn parse(&self, key: &str) -> KeyKind {
        let Some(rest) = key.strip_prefix(&self.prefix) else {
            return KeyKind::Foreign;
        };
        if let Some(name) = rest.strip_prefix(EVENT) {
            return name.parse().map_or(KeyKind::Unknown, KeyKind::Event);
        }
        if let Some(ballot) = rest.strip_prefix(BALLOT) {
            return ballot
                .split_once(':')
                .and_then(|(poll, _)| Uuid::parse_str(poll).ok())
                .map_or(KeyKind::Unknown, |poll_id| KeyKind::Ballot { poll_id });
        }
        SnapshotKey::from_suffix(rest).map_or(KeyKind::Unknown, KeyKind::Field)
    }
}
