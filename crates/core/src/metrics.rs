//! Prometheus metrics for the scheduler.
//!
//! This module provides metrics for:
//! - Submission and terminal outcomes of tasks
//! - Execution attempts and their duration
//! - Capacity usage and callback delivery

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

/// Tasks accepted by submission.
pub static TASKS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("transd_tasks_submitted_total", "Total tasks submitted").unwrap()
});

/// Tasks that reached a terminal status.
pub static TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transd_tasks_finished_total", "Total tasks finished"),
        &["status"], // "succeeded", "failed", "cancelled"
    )
    .unwrap()
});

/// Tasks currently holding a capacity slot.
pub static TASKS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("transd_tasks_running", "Number of tasks currently running").unwrap()
});

/// Execution attempts by result.
pub static ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transd_attempts_total", "Total execution attempts"),
        &["result"], // "success", "failure", "cancelled", "panic"
    )
    .unwrap()
});

/// Duration of a single plugin execution.
pub static EXECUTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transd_execution_duration_seconds",
            "Duration of plugin executions",
        )
        .buckets(vec![
            0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0,
        ]),
        &["result"],
    )
    .unwrap()
});

/// Callback deliveries that failed or timed out.
pub static CALLBACK_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transd_callback_failures_total",
        "Total callback deliveries that failed",
    )
    .unwrap()
});

/// All scheduler metrics, for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TASKS_SUBMITTED.clone()),
        Box::new(TASKS_FINISHED.clone()),
        Box::new(TASKS_RUNNING.clone()),
        Box::new(ATTEMPTS_TOTAL.clone()),
        Box::new(EXECUTION_DURATION.clone()),
        Box::new(CALLBACK_FAILURES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        TASKS_SUBMITTED.inc();
        TASKS_FINISHED.with_label_values(&["succeeded"]).inc();

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "transd_tasks_submitted_total"));
    }
}
