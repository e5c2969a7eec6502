//! Prometheus metrics for the batch runner.
//!
//! This module provides metrics for:
//! - Jobs (outcomes, process run time)
//! - Processes currently holding a worker slot
//! - Batches (terminal states)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs finished, by outcome.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("batchconv_jobs_total", "Total conversion jobs finished"),
        &["outcome"], // "succeeded", "spawn_failure", "process_failure", "cancelled"
    )
    .unwrap()
});

/// Wall time of conversion processes.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "batchconv_job_duration_seconds",
            "Duration of conversion processes",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Conversion processes currently running.
pub static PROCESSES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "batchconv_processes_in_flight",
        "Number of conversion processes currently running",
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches that reached a terminal state.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("batchconv_batches_total", "Total batches finished"),
        &["state"], // "completed", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(PROCESSES_IN_FLIGHT.clone()),
        Box::new(BATCHES_TOTAL.clone()),
    ]
}
