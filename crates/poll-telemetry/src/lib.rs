//! # Poll Telemetry
//!
//! Logging and metrics for ClassPoll contexts.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, human-readable or
//!   JSON lines, always on stderr
//! - **Metrics**: Prometheus counters and gauges in a global registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poll_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::for_context("presenter");
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `classpoll` | Service name in logs |
//! | `CP_CONTEXT_NAME` | `context` | Context label |
//! | `CP_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `CP_JSON_LOGS` | `false` | JSON log lines |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, ACTIVE_STUDENTS,
    COMMANDS_APPLIED, COMMANDS_REJECTED, COMMAND_DURATION, DUPLICATE_VOTES, EVENTS_REPLAYED,
    MARKERS_REFUSED, PENDING_ADMISSIONS, RESYNCS, STORAGE_FAILURES, VOTES_RECORDED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the context.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_logging(config)?;

    tracing::info!(service = %config.full_service_name(), "Telemetry initialised");
    Ok(TelemetryGuard {
        _metrics: metrics,
        service: config.full_service_name(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
    service: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = RESYNCS.with_label_values(&["manual"]).get();
        metric_inc!(RESYNCS, &["manual"]);
        assert_eq!(RESYNCS.with_label_values(&["manual"]).get(), before + 1.0);
    }
}
