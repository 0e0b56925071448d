//! Engine configuration.

use std::env;
use std::time::Duration;

use cp_02_session_model::SessionLimits;
use thiserror::Error;

/// Invalid engine configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("key prefix must not be empty")]
    EmptyPrefix,

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("{name}: minimum {min} exceeds maximum {max}")]
    InvertedRange {
        name: &'static str,
        min: u64,
        max: u64,
    },
}

/// Timing, storage layout and validation limits of one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Prefix of every key this engine reads or writes.
    pub key_prefix: String,

    /// Countdown period.
    pub tick_interval: Duration,

    /// Delay between the last student answering and the poll closing.
    pub auto_end_debounce: Duration,

    /// Safety-net resync period; `None` disables it.
    pub resync_interval: Option<Duration>,

    /// Event markers older than this are not replayed.
    pub marker_max_age: Duration,

    pub limits: SessionLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: "classpoll:".to_string(),
            tick_interval: Duration::from_secs(1),
            auto_end_debounce: Duration::from_secs(1),
            resync_interval: Some(Duration::from_secs(5)),
            marker_max_age: Duration::from_secs(60),
            limits: SessionLimits::default(),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CP_KEY_PREFIX`: store key prefix (default: `classpoll:`)
    /// - `CP_TICK_MS`: countdown period (default: 1000)
    /// - `CP_AUTO_END_MS`: auto-close debounce (default: 1000)
    /// - `CP_RESYNC_SECS`: periodic resync, 0 disables (default: 5)
    /// - `CP_MARKER_MAX_AGE_SECS`: replay window (default: 60)
    ///
    /// Session limits are read by [`SessionLimits::from_env`].
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            key_prefix: env::var("CP_KEY_PREFIX").unwrap_or(d.key_prefix),
            tick_interval: env_u64("CP_TICK_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.tick_interval),
            auto_end_debounce: env_u64("CP_AUTO_END_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.auto_end_debounce),
            resync_interval: match env_u64("CP_RESYNC_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => d.resync_interval,
            },
            marker_max_age: env_u64("CP_MARKER_MAX_AGE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.marker_max_age),
            limits: SessionLimits::from_env(),
        }
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        for (name, value) in [
            ("tick_interval", self.tick_interval),
            ("marker_max_age", self.marker_max_age),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { name });
            }
        }
        if self.resync_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ZeroDuration {
                name: "resync_interval",
            });
        }

        let l = &self.limits;
        let ranges = [
            ("name length", l.min_name_len as u64, l.max_name_len as u64),
            ("options", l.min_options as u64, l.max_options as u64),
            (
                "duration",
                u64::from(l.min_duration_secs),
                u64::from(l.max_duration_secs),
            ),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(ConfigError::InvertedRange { name, min, max });
            }
        }
        Ok(())
    }
}
