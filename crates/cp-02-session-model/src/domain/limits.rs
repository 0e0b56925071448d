//! Validation limits applied by session transitions.

use std::env;
use std::str::FromStr;

/// Bounds enforced on names, polls and chat messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimits {
    /// Minimum display-name length in characters, after trimming.
    pub min_name_len: usize,
    pub max_name_len: usize,
    pub min_options: usize,
    pub max_options: usize,
    /// Poll duration bounds in seconds, inclusive.
    pub min_duration_secs: u32,
    pub max_duration_secs: u32,
    /// Default countdown offered to presenters.
    pub default_duration_secs: u32,
    pub max_message_len: usize,
    /// Keep a summary of every closed poll.
    pub retain_history: bool,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            min_name_len: 2,
            max_name_len: 40,
            min_options: 2,
            max_options: 6,
            min_duration_secs: 10,
            max_duration_secs: 300,
            default_duration_secs: 30,
            max_message_len: 500,
            retain_history: false,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl SessionLimits {
    /// Load limits from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    ///
    /// # Environment Variables
    ///
    /// - `CP_MIN_NAME_LEN` / `CP_MAX_NAME_LEN` (default: 2 / 40)
    /// - `CP_MIN_DURATION_SECS` / `CP_MAX_DURATION_SECS` (default: 10 / 300)
    /// - `CP_DEFAULT_DURATION_SECS` (default: 30)
    /// - `CP_MAX_MESSAGE_LEN` (default: 500)
    /// - `CP_RETAIN_HISTORY` (default: false)
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_name_len: env_or("CP_MIN_NAME_LEN", d.min_name_len),
            max_name_len: env_or("CP_MAX_NAME_LEN", d.max_name_len),
            min_options: d.min_options,
            max_options: d.max_options,
            min_duration_secs: env_or("CP_MIN_DURATION_SECS", d.min_duration_secs),
            max_duration_secs: env_or("CP_MAX_DURATION_SECS", d.max_duration_secs),
            default_duration_secs: env_or("CP_DEFAULT_DURATION_SECS", d.default_duration_secs),
            max_message_len: env_or("CP_MAX_MESSAGE_LEN", d.max_message_len),
            retain_history: env::var("CP_RETAIN_HISTORY")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(d.retain_history),
        }
    }

    /// True if `secs` is an acceptable poll duration.
    #[must_use]
    pub fn duration_allowed(&self, secs: u32) -> bool {
        (self.min_duration_secs..=self.max_duration_secs).contains(&secs)
    }
}
