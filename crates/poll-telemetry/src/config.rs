//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Human label of this context (e.g. "presenter", "student-3")
    pub context_label: String,

    /// Log filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Include ANSI colours in human-readable output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "classpoll".to_string(),
            context_label: "context".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: classpoll)
    /// - `CP_CONTEXT_NAME`: Context label (default: context)
    /// - `CP_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `CP_JSON_LOGS`: JSON output (default: false, true in containers)
    /// - `NO_COLOR`: disables ANSI colours when set
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "classpoll".to_string()),

            context_label: env::var("CP_CONTEXT_NAME").unwrap_or_else(|_| "context".to_string()),

            log_level: env::var("CP_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("CP_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            ansi: env::var("NO_COLOR").is_err(),
        }
    }

    /// Configuration for a named context.
    pub fn for_context(label: &str) -> Self {
        let mut config = Self::from_env();
        config.context_label = label.to_string();
        config
    }

    /// Service name qualified by the context label.
    pub fn full_service_name(&self) -> String {
        format!("{}-{}", self.service_name, self.context_label)
    }
}
