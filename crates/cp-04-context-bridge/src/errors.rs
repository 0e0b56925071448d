//! Bridge errors.

use cp_03_sync_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The engine behind this bridge has stopped.
    #[error("engine is not running")]
    EngineStopped,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("malformed payload for {command}: {source}")]
    MalformedPayload {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown event {0:?}")]
    UnknownEvent(String),
}

impl From<EngineError> for BridgeError {
    fn from(_: EngineError) -> Self {
        Self::EngineStopped
    }
}
