//! # In-Memory Shared Store
//!
//! A `SharedStore` shared by several contexts living in one process.
//! `InMemorySharedStore::new()` creates the storage and a first connection;
//! `connect()` opens further connections, each with its own origin.
//!
//! Each connection can be switched into a failing mode where every write is
//! refused, which is how storage faults are exercised in tests.

use parking_lot::RwLock;
use shared_types::ContextId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::ports::{SharedStore, StorageChange, StoreError};

/// Change-feed buffer before slow subscribers start lagging.
pub const CHANGE_FEED_CAPACITY: usize = 1024;

struct Storage {
    entries: RwLock<BTreeMap<String, String>>,
    changes: broadcast::Sender<StorageChange>,
}

/// One connection to a process-local shared store.
#[derive(Clone)]
pub struct InMemorySharedStore {
    storage: Arc<Storage>,
    origin: ContextId,
    failing: Arc<AtomicBool>,
}

impl InMemorySharedStore {
    /// Create empty storage and return the first connection to it.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            storage: Arc::new(Storage {
                entries: RwLock::new(BTreeMap::new()),
                changes,
            }),
            origin: ContextId::new(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open another connection to the same storage with a fresh origin.
    #[must_use]
    pub fn connect(&self) -> Self {
        self.connect_as(ContextId::new())
    }

    /// Open another connection with a chosen origin.
    #[must_use]
    pub fn connect_as(&self, origin: ContextId) -> Self {
        Self {
            storage: self.storage.clone(),
            origin,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every write through this connection fail (or succeed again).
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of every entry.
    #[must_use]
    pub fn dump(&self) -> BTreeMap<String, String> {
        self.storage.entries.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are failing".to_string()));
        }
        Ok(())
    }

    fn announce(&self, key: &str, new_value: Option<String>) {
        // Nobody listening is fine.
        let _ = self.storage.changes.send(StorageChange {
            key: key.to_string(),
            new_value,
            origin: self.origin,
        });
    }
}

impl Default for InMemorySharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for InMemorySharedStore {
    fn origin(&self) -> ContextId {
        self.origin
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.storage.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.check_writable()?;
        let changed = {
            let mut entries = self.storage.entries.write();
            match entries.get(key) {
                Some(current) if *current == value => false,
                _ => {
                    entries.insert(key.to_string(), value.clone());
                    true
                }
            }
        };
        if changed {
            self.announce(key, Some(value));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let removed = self.storage.entries.write().remove(key).is_some();
        if removed {
            self.announce(key, None);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .storage
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StorageChange> {
        self.storage.changes.subscribe()
    }
}
