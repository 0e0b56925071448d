//! # Commands
//!
//! The closed set of commands a context may submit to its engine.
//!
//! On the wire a command is adjacently tagged:
//!
//! ```json
//! { "command": "submitVote", "payload": { "studentName": "Alice", "option": "X" } }
//! ```
//!
//! Payload-less commands carry an empty object (`"payload": {}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to change the session.
///
/// Commands originate from untrusted, possibly stale UI state. The engine
/// validates every one of them and silently drops those whose preconditions
/// do not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "camelCase")]
pub enum Command {
    /// A student asks to join.
    RequestAdmission { name: String },

    /// The presenter admits a pending student (or lifts a ban).
    Approve { name: String },

    /// The presenter turns a pending student away.
    Reject { name: String },

    /// The presenter starts a new poll, superseding any current one.
    CreatePoll {
        question: String,
        options: Vec<String>,
        /// Countdown in seconds.
        duration: u32,
    },

    /// A student casts their single ballot for the active poll.
    #[serde(rename_all = "camelCase")]
    SubmitVote { student_name: String, option: String },

    /// The presenter closes the active poll early.
    EndPoll {},

    /// The presenter evicts a student.
    RemoveStudent { name: String },

    /// The presenter returns the session to "no poll".
    ClearPoll {},

    /// Anyone posts to the chat log.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        author: String,
        text: String,
        is_presenter: bool,
    },

    /// The presenter wipes the whole classroom and starts over.
    ResetSession {},
}

impl Command {
    /// Every wire name, in declaration order.
    pub const NAMES: [&'static str; 10] = [
        "requestAdmission",
        "approve",
        "reject",
        "createPoll",
        "submitVote",
        "endPoll",
        "removeStudent",
        "clearPoll",
        "sendMessage",
        "resetSession",
    ];

    /// Wire name of this command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestAdmission { .. } => "requestAdmission",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::CreatePoll { .. } => "createPoll",
            Self::SubmitVote { .. } => "submitVote",
            Self::EndPoll {} => "endPoll",
            Self::RemoveStudent { .. } => "removeStudent",
            Self::ClearPoll {} => "clearPoll",
            Self::SendMessage { .. } => "sendMessage",
            Self::ResetSession {} => "resetSession",
        }
    }

    /// Build a command from its wire name and a JSON payload.
    ///
    /// A `null` payload is treated as `{}`.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error for an unknown name or a payload
    /// that does not match the command's shape.
    pub fn from_named(name: &str, payload: Value) -> Result<Self, serde_json::Error> {
        let payload = if payload.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            payload
        };
        serde_json::from_value(serde_json::json!({
            "command": name,
            "payload": payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submit_vote_wire_shape() {
        let cmd = Command::SubmitVote {
            student_name: "Alice".into(),
            option: "X".into(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "submitVote");
        assert_eq!(json["payload"]["studentName"], "Alice");
    }

    #[test]
    fn test_from_named_create_poll() {
        let cmd = Command::from_named(
            "createPoll",
            json!({ "question": "Q1", "options": ["X", "Y"], "duration": 30 }),
        )
        .unwrap();

        assert_eq!(
            cmd,
            Command::CreatePoll {
                question: "Q1".into(),
                options: vec!["X".into(), "Y".into()],
                duration: 30,
            }
        );
        assert_eq!(cmd.name(), "createPoll");
    }

    #[test]
    fn test_from_named_accepts_null_payload() {
        let cmd = Command::from_named("clearPoll", Value::Null).unwrap();
        assert_eq!(cmd, Command::ClearPoll {});
    }

    #[test]
    fn test_names_cover_commands() {
        for cmd in [
            Command::EndPoll {},
            Command::ClearPoll {},
            Command::ResetSession {},
            Command::Reject { name: "Sam".into() },
        ] {
            assert!(Command::NAMES.contains(&cmd.name()));
        }
        for name in ["endPoll", "clearPoll", "resetSession"] {
            assert_eq!(Command::from_named(name, Value::Null).unwrap().name(), name);
        }
    }

    #[test]
    fn test_from_named_rejects_unknown_command() {
        assert!(Command::from_named("dropTables", json!({})).is_err());
    }

    #[test]
    fn test_from_named_rejects_bad_payload() {
        assert!(Command::from_named("approve", json!({ "who": "Sam" })).is_err());
    }
}
