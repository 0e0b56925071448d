//! # Outbound Ports
//!
//! The shared key-value store every context of a classroom reads and writes,
//! and the wall clock.
//!
//! ## Store Semantics
//!
//! - String keys, string (JSON) values, last-writer-wins per key.
//! - Every change is announced on the change feed, tagged with the context
//!   that made it. Writing a value equal to the current one is not a change.
//! - Calls are synchronous and short; adapters must not block for long.

use shared_types::{ContextId, Timestamp};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from shared-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend refused or could not complete the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Filesystem or OS error.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One change announced on the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    /// Context that made the change.
    pub origin: ContextId,
}

/// Shared key-value store, one connection per context.
pub trait SharedStore: Send + Sync {
    /// Identity stamped on every change this connection makes.
    fn origin(&self) -> ContextId;

    /// Read a key.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a key.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Subscribe to changes made by any connection, including this one.
    fn subscribe_changes(&self) -> broadcast::Receiver<StorageChange>;
}

/// Source of wall-clock time in milliseconds.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Controllable clock for tests.
#[cfg(test)]
pub struct MockTimeSource {
    time: std::sync::atomic::AtomicU64,
}

#[cfg(test)]
impl MockTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: std::sync::atomic::AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(std::sync::atomic::Ordering::SeqCst)
    }
}
