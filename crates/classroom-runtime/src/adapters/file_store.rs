//! # File-Backed Shared Store
//!
//! Lets separate processes share one classroom through a directory.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//!   .lock                 advisory lock (fs2) held around every access
//!   store/<hex(key)>.json one record per key
//! ```
//!
//! Each record carries the origin of the context that last wrote it. A
//! removal leaves a tombstone record (`value: null`) so that other processes
//! learn who removed the key.
//!
//! Changes made through this connection are announced immediately. Changes
//! made by other processes are found by a polling watcher, see
//! [`FileSharedStore::spawn_watcher`]. All calls do blocking file I/O and
//! are expected to be short.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cp_03_sync_engine::{SharedStore, StorageChange, StoreError};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::ContextId;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Change-feed buffer before slow subscribers start lagging.
pub const CHANGE_FEED_CAPACITY: usize = 1024;

const RECORD_EXT: &str = "json";

/// On-disk shape of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FileRecord {
    origin: ContextId,
    /// `None` marks a removed key.
    value: Option<String>,
}

/// Releases the advisory lock when dropped.
struct DirLock(File);

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// One process's connection to a directory-backed store.
#[derive(Clone)]
pub struct FileSharedStore {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    entries: PathBuf,
    origin: ContextId,
    changes: broadcast::Sender<StorageChange>,
    /// Raw file contents last seen per key, to tell new writes apart.
    seen: Mutex<HashMap<String, String>>,
}

impl FileSharedStore {
    /// Open (creating if needed) the store under `root` with a fresh origin.
    ///
    /// # Errors
    ///
    /// Fails if the directories cannot be created or read.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_as(root, ContextId::new())
    }

    /// Open the store with a chosen origin.
    ///
    /// # Errors
    ///
    /// Fails if the directories cannot be created or read.
    pub fn open_as(root: impl AsRef<Path>, origin: ContextId) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let entries = root.join("store");
        fs::create_dir_all(&entries)?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let store = Self {
            inner: Arc::new(Inner {
                root,
                entries,
                origin,
                changes,
                seen: Mutex::new(HashMap::new()),
            }),
        };

        // Start from what is already on disk so the watcher only reports
        // changes made after opening.
        let current = {
            let _lock = store.lock_shared()?;
            store.scan()?
        };
        *store.inner.seen.lock() = current;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Poll the directory every `interval` and announce changes made by
    /// other processes. The task ends when every connection clone is gone.
    pub fn spawn_watcher(&self, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let store = FileSharedStore { inner };
                if let Err(e) = store.poll_changes() {
                    warn!("[runtime] Store watcher scan failed: {}", e);
                }
            }
        })
    }

    /// Compare the directory with what was last seen and announce every
    /// difference. Returns the number of changes announced.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read.
    pub fn poll_changes(&self) -> Result<usize, StoreError> {
        let current = {
            let _lock = self.lock_shared()?;
            self.scan()?
        };

        let mut announced = Vec::new();
        {
            let mut seen = self.inner.seen.lock();
            for (key, raw) in &current {
                let previous = seen.get(key);
                if previous == Some(raw) {
                    continue;
                }
                match serde_json::from_str::<FileRecord>(raw) {
                    // Tombstone of a key this connection never saw alive.
                    Ok(record) if record.value.is_none() && previous.is_none() => {}
                    Ok(record) => announced.push(StorageChange {
                        key: key.clone(),
                        new_value: record.value,
                        origin: record.origin,
                    }),
                    Err(e) => debug!(%key, "Skipping unreadable record: {}", e),
                }
            }
            for key in seen.keys().filter(|k| !current.contains_key(*k)) {
                // Deleted outside the store; nobody to attribute it to.
                announced.push(StorageChange {
                    key: key.clone(),
                    new_value: None,
                    origin: ContextId(Uuid::nil()),
                });
            }
            *seen = current;
        }

        let count = announced.len();
        for change in announced {
            let _ = self.inner.changes.send(change);
        }
        Ok(count)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.inner
            .entries
            .join(format!("{}.{RECORD_EXT}", hex::encode(key.as_bytes())))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != RECORD_EXT {
            return None;
        }
        let bytes = hex::decode(path.file_stem()?.to_str()?).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn lock_file(&self) -> Result<File, StoreError> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.inner.root.join(".lock"))?)
    }

    fn lock_shared(&self) -> Result<DirLock, StoreError> {
        let file = self.lock_file()?;
        file.lock_shared()?;
        Ok(DirLock(file))
    }

    fn lock_exclusive(&self) -> Result<DirLock, StoreError> {
        let file = self.lock_file()?;
        file.lock_exclusive()?;
        Ok(DirLock(file))
    }

    /// Raw contents of every record. Caller holds the lock.
    fn scan(&self) -> Result<HashMap<String, String>, StoreError> {
        let mut records = HashMap::new();
        for entry in fs::read_dir(&self.inner.entries)? {
            let path = entry?.path();
            let Some(key) = Self::key_for(&path) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(raw) => {
                    records.insert(key, raw);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(records)
    }

    /// Caller holds the lock.
    fn read_record(&self, key: &str) -> Result<Option<FileRecord>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file and rename. Caller holds the lock.
    fn write_record(&self, key: &str, record: &FileRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(raw.as_bytes())?;
            file.sync_data()?;
        }
        fs::rename(&tmp, &path)?;
        self.inner.seen.lock().insert(key.to_string(), raw);
        Ok(())
    }

    fn announce(&self, key: &str, new_value: Option<String>) {
        let _ = self.inner.changes.send(StorageChange {
            key: key.to_string(),
            new_value,
            origin: self.inner.origin,
        });
    }
}

impl SharedStore for FileSharedStore {
    fn origin(&self) -> ContextId {
        self.inner.origin
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _lock = self.lock_shared()?;
        Ok(self.read_record(key)?.and_then(|r| r.value))
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        {
            let _lock = self.lock_exclusive()?;
            let current = self.read_record(key).ok().flatten().and_then(|r| r.value);
            if current.as_deref() == Some(value.as_str()) {
                return Ok(());
            }
            self.write_record(
                key,
                &FileRecord {
                    origin: self.inner.origin,
                    value: Some(value.clone()),
                },
            )?;
        }
        self.announce(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        {
            let _lock = self.lock_exclusive()?;
            let present = self
                .read_record(key)
                .ok()
                .flatten()
                .is_some_and(|r| r.value.is_some());
            if !present {
                return Ok(());
            }
            self.write_record(
                key,
                &FileRecord {
                    origin: self.inner.origin,
                    value: None,
                },
            )?;
        }
        self.announce(key, None);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let records = {
            let _lock = self.lock_shared()?;
            self.scan()?
        };
        let mut keys: Vec<String> = records
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(_, raw)| {
                serde_json::from_str::<FileRecord>(raw).is_ok_and(|r| r.value.is_some())
            })
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.changes.subscribe()
    }
}
