//! Observability infrastructure for metric evaluation
//!
//! Provides:
//! - Prometheus metrics (fetch latency, retries, upstream failures, verdicts, batch duration)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<WatchMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct WatchMetricsInner {
    fetch_latency_seconds: Histogram,
    batch_duration_seconds: Histogram,
    fetch_attempts: IntCounter,
    fetch_retries: IntCounter,
    upstream_failures: IntCounter,
    verdicts: IntCounterVec,
    monitors_configured: IntGauge,
    last_batch_timestamp: IntGauge,
}

impl WatchMetricsInner {
    fn new() -> Self {
        Self {
            fetch_latency_seconds: register_histogram!(
                "metricwatch_fetch_latency_seconds",
                "Time spent on a single metrics source request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            batch_duration_seconds: register_histogram!(
                "metricwatch_batch_duration_seconds",
                "Time spent evaluating a full batch of monitors",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register batch_duration_seconds"),

            fetch_attempts: register_int_counter!(
                "metricwatch_fetch_attempts_total",
                "Total number of requests sent to the metrics source"
            )
            .expect("Failed to register fetch_attempts"),

            fetch_retries: register_int_counter!(
                "metricwatch_fetch_retries_total",
                "Total number of fetch retries after a transient failure"
            )
            .expect("Failed to register fetch_retries"),

            upstream_failures: register_int_counter!(
                "metricwatch_upstream_failures_total",
                "Total number of fetches that failed after exhausting retries"
            )
            .expect("Failed to register upstream_failures"),

            verdicts: register_int_counter_vec!(
                "metricwatch_verdicts_total",
                "Verdicts produced, by state",
                &["state"]
            )
            .expect("Failed to register verdicts"),

            monitors_configured: register_int_gauge!(
                "metricwatch_monitors_configured",
                "Number of monitors in the active configuration"
            )
            .expect("Failed to register monitors_configured"),

            last_batch_timestamp: register_int_gauge!(
                "metricwatch_last_batch_timestamp_seconds",
                "Unix timestamp of the last completed batch"
            )
            .expect("Failed to register last_batch_timestamp"),
        }
    }
}

/// Metric evaluation counters for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct WatchMetrics {
    _private: (),
}

impl Default for WatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchMetrics").finish()
    }
}

impl WatchMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(WatchMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &WatchMetricsInner {
        GLOBAL_METRICS.get_or_init(WatchMetricsInner::new)
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
        self.inner().fetch_attempts.inc();
    }

    pub fn observe_batch_duration(&self, duration_secs: f64) {
        self.inner().batch_duration_seconds.observe(duration_secs);
        self.inner()
            .last_batch_timestamp
            .set(chrono::Utc::now().timestamp());
    }

    pub fn inc_fetch_retries(&self) {
        self.inner().fetch_retries.inc();
    }

    pub fn inc_upstream_failures(&self) {
        self.inner().upstream_failures.inc();
    }

    /// Count a verdict; `state` is `triggered`, `ok` or `failed`
    pub fn inc_verdict(&self, state: &str) {
        self.inner().verdicts.with_label_values(&[state]).inc();
    }

    pub fn set_monitors_configured(&self, count: i64) {
        self.inner().monitors_configured.set(count);
    }
}

/// Structured logger for evaluation events
///
/// Provides consistent JSON-formatted logging for verdicts, upstream
/// failures and batch lifecycle events.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log a verdict for one monitor
    pub fn log_verdict(
        &self,
        monitor: &str,
        resource_id: &str,
        metric: &str,
        datapoints: usize,
        triggered: bool,
        message: &str,
    ) {
        if triggered {
            warn!(
                event = "verdict",
                node = %self.node_name,
                monitor = %monitor,
                resource_id = %resource_id,
                metric = %metric,
                datapoints = datapoints,
                triggered = true,
                "Threshold breached: {}", message
            );
        } else {
            info!(
                event = "verdict",
                node = %self.node_name,
                monitor = %monitor,
                resource_id = %resource_id,
                metric = %metric,
                datapoints = datapoints,
                triggered = false,
                "Within threshold: {}", message
            );
        }
    }

    /// Log a monitor that could not be evaluated
    pub fn log_fetch_failure(&self, monitor: &str, resource_id: &str, metric: &str, error: &str) {
        warn!(
            event = "fetch_failed",
            node = %self.node_name,
            monitor = %monitor,
            resource_id = %resource_id,
            metric = %metric,
            error = %error,
            "Monitor could not be evaluated"
        );
    }

    /// Log the summary of a batch
    pub fn log_batch_complete(&self, evaluated: usize, triggered: usize, failed: usize, elapsed_ms: u128) {
        info!(
            event = "batch_complete",
            node = %self.node_name,
            evaluated = evaluated,
            triggered = triggered,
            failed = failed,
            elapsed_ms = elapsed_ms,
            "Batch evaluation complete"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, monitors: usize) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            monitors = monitors,
            "Metricwatch agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Metricwatch agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_metrics_creation() {
        let metrics = WatchMetrics::new();

        metrics.observe_fetch_latency(0.01);
        metrics.observe_batch_duration(0.5);
        metrics.inc_fetch_retries();
        metrics.inc_upstream_failures();
        metrics.inc_verdict("triggered");
        metrics.set_monitors_configured(3);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "metricwatch_verdicts_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name, "test-node");
    }
}
