//! Rejection reasons for session transitions.

use thiserror::Error;

/// Why a command left the session unchanged.
///
/// Rejections are never surfaced to the caller of `submit`; the engine logs
/// and counts them. `reason()` is the stable label used for metrics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("name must be at least {min} characters")]
    NameTooShort { min: usize },

    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("name {0:?} is already in the session")]
    NameTaken(String),

    #[error("name {0:?} is blacklisted")]
    NameBlacklisted(String),

    #[error("name {0:?} is already waiting for approval")]
    AlreadyPending(String),

    #[error("no pending admission for {0:?}")]
    NotPending(String),

    #[error("question is empty")]
    QuestionEmpty,

    #[error("poll needs between {min} and {max} options, got {got}")]
    OptionCount { got: usize, min: usize, max: usize },

    #[error("option labels must not be empty")]
    EmptyOption,

    #[error("option {0:?} appears more than once")]
    DuplicateOption(String),

    #[error("duration {got}s is outside {min}..={max}s")]
    DurationOutOfRange { got: u32, min: u32, max: u32 },

    #[error("no active poll")]
    NoActivePoll,

    #[error("the poll is past its deadline")]
    PollExpired,

    #[error("option {0:?} is not part of the current poll")]
    UnknownOption(String),

    #[error("{0:?} is not in the roster")]
    UnknownStudent(String),

    #[error("{0:?} has already answered")]
    AlreadyAnswered(String),

    #[error("there is no poll to clear")]
    NothingToClear,

    #[error("message author is empty")]
    AuthorEmpty,

    #[error("message is empty")]
    MessageEmpty,

    #[error("message is longer than {max} characters")]
    MessageTooLong { max: usize },

    #[error("countdown tick for a poll that is not running")]
    StaleTick,
}

impl Rejection {
    /// Stable, low-cardinality label.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NameTooShort { .. } => "name_too_short",
            Self::NameTooLong { .. } => "name_too_long",
            Self::NameTaken(_) => "name_taken",
            Self::NameBlacklisted(_) => "name_blacklisted",
            Self::AlreadyPending(_) => "already_pending",
            Self::NotPending(_) => "not_pending",
            Self::QuestionEmpty => "question_empty",
            Self::OptionCount { .. } => "option_count",
            Self::EmptyOption => "empty_option",
            Self::DuplicateOption(_) => "duplicate_option",
            Self::DurationOutOfRange { .. } => "duration_out_of_range",
            Self::NoActivePoll => "no_active_poll",
            Self::PollExpired => "poll_expired",
            Self::UnknownOption(_) => "unknown_option",
            Self::UnknownStudent(_) => "unknown_student",
            Self::AlreadyAnswered(_) => "already_answered",
            Self::NothingToClear => "nothing_to_clear",
            Self::AuthorEmpty => "author_empty",
            Self::MessageEmpty => "message_empty",
            Self::MessageTooLong { .. } => "message_too_long",
            Self::StaleTick => "stale_tick",
        }
    }
}
