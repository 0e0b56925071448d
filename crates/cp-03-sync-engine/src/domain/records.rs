//! Records persisted next to the session snapshot.

use serde::{Deserialize, Serialize};
use shared_bus::SessionEvent;
use shared_types::{Ballot, ContextId, PollId, Timestamp};
use uuid::Uuid;

/// One accepted ballot, stored under its own key so concurrent votes from
/// different contexts never overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotRecord {
    pub poll_id: PollId,
    pub student_name: String,
    pub option: String,
    pub cast_at: Timestamp,
}

impl BallotRecord {
    pub fn ballot(&self) -> Ballot {
        Ballot::new(self.student_name.clone(), self.option.clone())
    }
}

/// The latest event of one kind, written so other contexts can replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarker {
    pub id: Uuid,
    pub origin: ContextId,
    pub timestamp: Timestamp,
    pub event: SessionEvent,
}

impl EventMarker {
    pub fn new(origin: ContextId, timestamp: Timestamp, event: SessionEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            timestamp,
            event,
        }
    }
}
