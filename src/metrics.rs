//! Prometheus metrics for scan latency, venue health and execution outcomes.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Quote fan-out round latency metric name.
pub const METRIC_QUOTE_ROUND_LATENCY: &str = "quote_round_latency_ms";
/// Scan round latency metric name.
pub const METRIC_SCAN_ROUND_LATENCY: &str = "scan_round_latency_ms";
/// Venue request error counter metric name.
pub const METRIC_VENUE_ERRORS: &str = "venue_errors_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Executions started counter metric name.
pub const METRIC_EXECUTIONS_STARTED: &str = "executions_started_total";
/// Executions completed counter metric name.
pub const METRIC_EXECUTIONS_COMPLETED: &str = "executions_completed_total";
/// Executions failed counter metric name.
pub const METRIC_EXECUTIONS_FAILED: &str = "executions_failed_total";
/// Compensation attempts counter metric name.
pub const METRIC_COMPENSATIONS: &str = "compensations_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_QUOTE_ROUND_LATENCY,
        "Concurrent quote fan-out latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SCAN_ROUND_LATENCY,
        "Full scan round latency in milliseconds"
    );

    describe_counter!(
        METRIC_VENUE_ERRORS,
        "Total venue requests that timed out or failed"
    );
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total opportunities above the reporting threshold"
    );
    describe_counter!(METRIC_EXECUTIONS_STARTED, "Total executions started");
    describe_counter!(
        METRIC_EXECUTIONS_COMPLETED,
        "Total executions that completed with both legs filled"
    );
    describe_counter!(
        METRIC_EXECUTIONS_FAILED,
        "Total executions that ended in a failed state"
    );
    describe_counter!(
        METRIC_COMPENSATIONS,
        "Total reversing orders attempted after a mid-saga failure"
    );

    debug!("Metrics initialized");
}

/// Record one quote fan-out round.
pub fn record_quote_round_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_QUOTE_ROUND_LATENCY).record(latency_ms);
}

/// Record one full scan round.
pub fn record_scan_round_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_SCAN_ROUND_LATENCY).record(latency_ms);
}

/// Increment the error counter for a venue.
pub fn inc_venue_errors(venue: &str) {
    counter!(METRIC_VENUE_ERRORS, "venue" => venue.to_string()).increment(1);
}

/// Increment detected opportunities, labelled by kind.
pub fn inc_opportunities_detected(kind: &str) {
    counter!(METRIC_OPPORTUNITIES_DETECTED, "kind" => kind.to_string()).increment(1);
}

/// Increment started executions.
pub fn inc_executions_started() {
    counter!(METRIC_EXECUTIONS_STARTED).increment(1);
}

/// Increment completed executions.
pub fn inc_executions_completed() {
    counter!(METRIC_EXECUTIONS_COMPLETED).increment(1);
}

/// Increment failed executions, labelled by failure reason.
pub fn inc_executions_failed(reason: &str) {
    counter!(METRIC_EXECUTIONS_FAILED, "reason" => reason.to_string()).increment(1);
}

/// Increment compensation attempts.
pub fn inc_compensations() {
    counter!(METRIC_COMPENSATIONS).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for a scan round.
pub fn timer_scan_round() -> LatencyTimer {
    LatencyTimer::new(METRIC_SCAN_ROUND_LATENCY)
}
