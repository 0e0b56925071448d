//! # Context Container
//!
//! Wires one headless context together.
//!
//! ## Startup Order
//!
//! 1. Open the file store under the data directory
//! 2. Start the store watcher
//! 3. Spawn the sync engine on the store (the engine resyncs on start)
//! 4. Wrap the engine in a context bridge

pub mod config;

pub use config::{RuntimeConfig, RuntimeConfigError};

use std::sync::Arc;

use cp_03_sync_engine::{EngineError, StoreError, SyncEngine};
use cp_04_context_bridge::ContextBridge;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::FileSharedStore;

/// Startup failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] RuntimeConfigError),

    #[error("cannot open shared store: {0}")]
    Store(#[from] StoreError),

    #[error("cannot start engine: {0}")]
    Engine(#[from] EngineError),
}

/// A running context: store, watcher, engine and bridge.
pub struct ClassroomContext {
    bridge: ContextBridge,
    store: FileSharedStore,
    engine_task: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl ClassroomContext {
    /// Start a context. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or an unusable data directory.
    pub fn start(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let store = FileSharedStore::open(&config.data_dir)?;
        let watcher = store.spawn_watcher(config.watch_interval);
        let (engine, engine_task) =
            SyncEngine::spawn(Arc::new(store.clone()), config.engine.clone())?;

        info!(
            "[runtime] Context {} ({}) joined classroom at {}",
            config.context_name,
            engine.context_id(),
            config.data_dir.display()
        );

        Ok(Self {
            bridge: ContextBridge::new(engine),
            store,
            engine_task,
            watcher,
        })
    }

    pub fn bridge(&self) -> &ContextBridge {
        &self.bridge
    }

    pub fn store(&self) -> &FileSharedStore {
        &self.store
    }

    /// Stop the engine after queued work, then the watcher.
    pub async fn shutdown(self) {
        info!("[runtime] Initiating graceful shutdown...");
        self.bridge.engine().shutdown();
        if let Err(e) = self.engine_task.await {
            warn!("[runtime] Engine task ended abnormally: {}", e);
        }
        self.watcher.abort();
        info!("[runtime] Shutdown complete");
    }
}
