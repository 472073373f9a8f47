//! Prometheus metrics for the bracket worker.
//!
//! Metrics are recorded through the `metrics` facade and only exported when a
//! listener address is configured. Without one the macros are no-ops.
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//! metrics::brackets_generated_total("double_elimination");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Bracket Metrics
// ============================================================================

/// Increment generated brackets counter.
pub fn brackets_generated_total(format: &str) {
    metrics::counter!("brackets_generated_total", "format" => format.to_string()).increment(1);
}

/// Increment reported results counter.
pub fn results_reported_total() {
    metrics::counter!("results_reported_total").increment(1);
}

/// Increment completed tournaments counter.
pub fn tournaments_completed_total() {
    metrics::counter!("tournaments_completed_total").increment(1);
}

/// Add to the reminders counter, one per reminded match.
pub fn reminders_sent_total(count: usize) {
    metrics::counter!("reminders_sent_total").increment(count as u64);
}

// ============================================================================
// Worker Metrics
// ============================================================================

/// Record command duration in milliseconds.
pub fn command_duration_ms(command: &str, duration_ms: f64) {
    metrics::histogram!("command_duration_ms", "command" => command.to_string())
        .record(duration_ms);
}

/// Increment failed commands counter.
pub fn command_errors_total(command: &str) {
    metrics::counter!("command_errors_total", "command" => command.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_exporter() {
        // no recorder installed, all calls are no-ops
        brackets_generated_total("round_robin");
        results_reported_total();
        tournaments_completed_total();
        reminders_sent_total(3);
        command_duration_ms("report", 12.5);
        command_errors_total("report");
    }
}
