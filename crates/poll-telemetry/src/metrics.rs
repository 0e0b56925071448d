//! Prometheus metrics for ClassPoll contexts.
//!
//! All metrics follow the naming convention: `classpoll_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., votes_recorded_total)
//! - **Gauge**: Value that can go up or down (e.g., students_active)
//! - **Histogram**: Distribution of values (e.g., command_apply_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // COMMAND METRICS
    // =========================================================================

    /// Commands that changed the session
    pub static ref COMMANDS_APPLIED: CounterVec = CounterVec::new(
        Opts::new("classpoll_engine_commands_applied_total", "Commands applied to the session"),
        &["command"]
    ).expect("metric creation failed");

    /// Commands dropped by validation
    pub static ref COMMANDS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("classpoll_engine_commands_rejected_total", "Commands rejected by validation"),
        &["reason"]
    ).expect("metric creation failed");

    /// Time spent applying and persisting one command
    pub static ref COMMAND_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "classpoll_engine_command_duration_seconds",
            "Time spent applying and persisting a command"
        ).buckets(exponential_buckets(0.00001, 2.0, 15).unwrap_or_default())
    ).expect("metric creation failed");

    // =========================================================================
    // POLL METRICS
    // =========================================================================

    /// Accepted ballots
    pub static ref VOTES_RECORDED: Counter = Counter::new(
        "classpoll_poll_votes_recorded_total",
        "Total ballots accepted"
    ).expect("metric creation failed");

    /// Ballots refused because the student already voted
    pub static ref DUPLICATE_VOTES: Counter = Counter::new(
        "classpoll_poll_duplicate_votes_total",
        "Ballots dropped as duplicates"
    ).expect("metric creation failed");

    /// Approved students in the roster
    pub static ref ACTIVE_STUDENTS: Gauge = Gauge::new(
        "classpoll_session_students_active",
        "Number of students in the roster"
    ).expect("metric creation failed");

    /// Admission requests waiting for a decision
    pub static ref PENDING_ADMISSIONS: Gauge = Gauge::new(
        "classpoll_session_admissions_pending",
        "Number of pending admission requests"
    ).expect("metric creation failed");

    // =========================================================================
    // SYNCHRONISATION METRICS
    // =========================================================================

    /// Full resyncs from the shared store
    pub static ref RESYNCS: CounterVec = CounterVec::new(
        Opts::new("classpoll_sync_resyncs_total", "Full resyncs from the shared store"),
        &["trigger"]  // trigger: remote/periodic/lagged/manual
    ).expect("metric creation failed");

    /// Event markers replayed from other contexts
    pub static ref EVENTS_REPLAYED: CounterVec = CounterVec::new(
        Opts::new("classpoll_sync_events_replayed_total", "Remote events replayed locally"),
        &["event"]
    ).expect("metric creation failed");

    /// Event markers refused by the replay guard
    pub static ref MARKERS_REFUSED: CounterVec = CounterVec::new(
        Opts::new("classpoll_sync_markers_refused_total", "Event markers refused"),
        &["cause"]  // cause: duplicate/too_old/from_future/malformed
    ).expect("metric creation failed");

    /// Failed shared-store operations
    pub static ref STORAGE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("classpoll_sync_storage_failures_total", "Failed shared-store operations"),
        &["operation"]  // operation: get/set/remove/scan
    ).expect("metric creation failed");
}

/// Handle for the metrics registry
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register all metrics with the global registry.
///
/// Registering twice is not an error; the second call returns a handle to
/// the same registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Commands
        Box::new(COMMANDS_APPLIED.clone()),
        Box::new(COMMANDS_REJECTED.clone()),
        Box::new(COMMAND_DURATION.clone()),
        // Poll
        Box::new(VOTES_RECORDED.clone()),
        Box::new(DUPLICATE_VOTES.clone()),
        Box::new(ACTIVE_STUDENTS.clone()),
        Box::new(PENDING_ADMISSIONS.clone()),
        // Sync
        Box::new(RESYNCS.clone()),
        Box::new(EVENTS_REPLAYED.clone()),
        Box::new(MARKERS_REFUSED.clone()),
        Box::new(STORAGE_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
