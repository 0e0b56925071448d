//! # Runtime Configuration
//!
//! Everything a headless context needs, loaded from the environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CP_CONTEXT_NAME` | `context` | Label used in logs |
//! | `CP_DATA_DIR` | `./classpoll-data` | Directory shared by every context of a classroom |
//! | `CP_WATCH_MS` | `250` | How often the file store looks for changes by other processes |
//!
//! Engine, session and telemetry settings are read by their own loaders.

use std::path::PathBuf;
use std::time::Duration;

use cp_03_sync_engine::{ConfigError, EngineConfig};
use poll_telemetry::TelemetryConfig;
use thiserror::Error;

/// Runtime configuration errors.
#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("CP_DATA_DIR must not be empty")]
    EmptyDataDir,

    #[error("CP_WATCH_MS must be greater than zero")]
    ZeroWatchInterval,

    #[error(transparent)]
    Engine(#[from] ConfigError),
}

/// Complete configuration of one headless context.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub context_name: String,
    pub data_dir: PathBuf,
    pub watch_interval: Duration,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            context_name: "context".to_string(),
            data_dir: PathBuf::from("./classpoll-data"),
            watch_interval: Duration::from_millis(250),
            engine: EngineConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let context_name =
            std::env::var("CP_CONTEXT_NAME").unwrap_or(defaults.context_name);

        Self {
            data_dir: std::env::var("CP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            watch_interval: std::env::var("CP_WATCH_MS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.watch_interval),
            engine: EngineConfig::from_env(),
            telemetry: TelemetryConfig::for_context(&context_name),
            context_name,
        }
    }

    /// Check the configuration before anything is started.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), RuntimeConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(RuntimeConfigError::EmptyDataDir);
        }
        if self.watch_interval.is_zero() {
            return Err(RuntimeConfigError::ZeroWatchInterval);
        }
        self.engine.validate()?;
        Ok(())
    }
}
