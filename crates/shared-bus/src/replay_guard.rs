//! # Time-Bounded Replay Guard
//!
//! Event markers written by one context are replayed by every other context
//! that observes them. The guard makes that replay at-most-once and refuses
//! markers outside the acceptance window.
//!
//! - A marker id is accepted once; later sightings are duplicates.
//! - Markers older than `max_age` or further than `max_future_skew` ahead
//!   of the local clock are refused.
//! - Ids are garbage-collected once they fall out of `retention`.
//!
//! All timestamps are milliseconds since the UNIX epoch and are passed in by
//! the caller, so the guard itself never reads a clock.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Reasons a marker is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The marker was already delivered.
    #[error("Event marker {id} was already delivered")]
    Duplicate { id: Uuid },

    /// The marker is older than the acceptance window.
    #[error("Event marker timestamp {timestamp} is too old (threshold: {threshold})")]
    TooOld { timestamp: u64, threshold: u64 },

    /// The marker claims to come from the future.
    #[error("Event marker timestamp {timestamp} is in the future (threshold: {threshold})")]
    FromFuture { timestamp: u64, threshold: u64 },
}

/// Time-bounded cache of delivered marker ids.
#[derive(Debug)]
pub struct TimeBoundedReplayGuard {
    /// Marker id -> marker timestamp.
    seen: HashMap<Uuid, u64>,
    max_age_ms: u64,
    max_future_skew_ms: u64,
    retention_ms: u64,
    gc_interval_ms: u64,
    last_gc: u64,
}

impl TimeBoundedReplayGuard {
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60);
    pub const DEFAULT_MAX_FUTURE_SKEW: Duration = Duration::from_secs(10);
    pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10);

    /// Guard with the default 60s window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_age(Self::DEFAULT_MAX_AGE)
    }

    /// Guard accepting markers up to `max_age` old. Ids are retained for
    /// twice that long.
    #[must_use]
    pub fn with_max_age(max_age: Duration) -> Self {
        let max_age_ms = duration_ms(max_age);
        Self {
            seen: HashMap::new(),
            max_age_ms,
            max_future_skew_ms: duration_ms(Self::DEFAULT_MAX_FUTURE_SKEW),
            retention_ms: max_age_ms.saturating_mul(2),
            gc_interval_ms: duration_ms(Self::DEFAULT_GC_INTERVAL),
            last_gc: 0,
        }
    }

    /// Validate a marker and remember its id.
    ///
    /// The timestamp window is checked before the id, so a stale marker is
    /// reported as `TooOld` even if it was also seen before.
    ///
    /// # Errors
    ///
    /// - `ReplayError::TooOld` - timestamp before `now - max_age`
    /// - `ReplayError::FromFuture` - timestamp after `now + max_future_skew`
    /// - `ReplayError::Duplicate` - id already accepted
    pub fn check_and_record(&mut self, id: Uuid, timestamp: u64, now: u64) -> Result<(), ReplayError> {
        let min_valid = now.saturating_sub(self.max_age_ms);
        let max_valid = now.saturating_add(self.max_future_skew_ms);

        if timestamp < min_valid {
            return Err(ReplayError::TooOld {
                timestamp,
                threshold: min_valid,
            });
        }
        if timestamp > max_valid {
            return Err(ReplayError::FromFuture {
                timestamp,
                threshold: max_valid,
            });
        }

        if now.saturating_sub(self.last_gc) > self.gc_interval_ms {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if self.seen.contains_key(&id) {
            return Err(ReplayError::Duplicate { id });
        }
        self.seen.insert(id, timestamp);
        Ok(())
    }

    /// Remember an id without validating it, e.g. a marker this context
    /// wrote itself.
    pub fn record(&mut self, id: Uuid, timestamp: u64) {
        self.seen.insert(id, timestamp);
    }

    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.seen.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn garbage_collect(&mut self, now: u64) {
        let expiry = now.saturating_sub(self.retention_ms);
        self.seen.retain(|_, &mut ts| ts > expiry);
    }
}

impl Default for TimeBoundedReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
