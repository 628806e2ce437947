//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the transd server:
//! - HTTP request metrics (latency, counts)
//! - Scheduler status (collected dynamically)
//! - Core scheduler metrics registered from `transcode_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::error;
use transcode_core::SchedulerStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transd_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transd_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transd_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Whether the dispatch loop is running (1) or stopped (0).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transd_scheduler_running",
        "Whether the scheduler dispatch loop is running",
    )
    .unwrap()
});

/// Configured concurrency limit.
pub static SCHEDULER_MAX_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transd_scheduler_max_running",
        "Maximum number of concurrently running tasks",
    )
    .unwrap()
});

/// Tasks by current status (collected dynamically).
pub static TASKS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("transd_tasks_by_status", "Current task count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Scheduler
    registry
        .register(Box::new(SCHEDULER_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(SCHEDULER_MAX_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(TASKS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (submissions, attempts, callbacks)
    for metric in transcode_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the status gauges reflect the scheduler as it
/// is right now.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.scheduler().status();
    SCHEDULER_RUNNING.set(if status.running { 1 } else { 0 });
    SCHEDULER_MAX_RUNNING.set(status.max_running as i64);

    for (label, count) in status_counts(&status) {
        TASKS_BY_STATUS.with_label_values(&[label]).set(count);
    }
}

/// Task counts per status label.
fn status_counts(status: &SchedulerStatus) -> [(&'static str, i64); 5] {
    [
        ("pending", status.pending as i64),
        ("running", status.running_tasks as i64),
        ("succeeded", status.succeeded as i64),
        ("failed", status.failed as i64),
        ("cancelled", status.cancelled as i64),
    ]
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static UUID_REGEX: Lazy<regex_lite::Regex> = Lazy::new(|| {
        regex_lite::Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .unwrap()
    });
    static NUMERIC_REGEX: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    let result = UUID_REGEX.replace_all(path, "{id}");
    let result = NUMERIC_REGEX.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/tasks/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/tasks/{id}");
    }

    #[test]
    fn test_normalize_path_uuid_with_suffix() {
        let path = "/api/v1/tasks/550e8400-e29b-41d4-a716-446655440000/process";
        assert_eq!(normalize_path(path), "/api/v1/tasks/{id}/process");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/tasks/12345";
        assert_eq!(normalize_path(path), "/api/v1/tasks/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("transd_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_status_counts_use_task_statuses() {
        let status = SchedulerStatus {
            running: true,
            max_running: 1,
            current_running: 0,
            total_tasks: 4,
            pending: 1,
            running_tasks: 2,
            succeeded: 1,
            failed: 0,
            cancelled: 0,
            formats: vec![".flv".to_string()],
        };

        let counts = status_counts(&status);
        assert!(counts.contains(&("running", 2)));
        assert!(counts.contains(&("pending", 1)));
        assert_eq!(counts.iter().map(|(_, n)| n).sum::<i64>(), 4);
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        transcode_core::metrics::TASKS_SUBMITTED.inc();
        SCHEDULER_RUNNING.set(0);
        TASKS_BY_STATUS.with_label_values(&["pending"]).set(0);

        let output = encode_metrics();
        assert!(output.contains("transd_tasks_submitted_total"));
        assert!(output.contains("transd_scheduler_running"));
        assert!(output.contains("transd_tasks_by_status"));
    }
}
