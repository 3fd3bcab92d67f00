//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Rendition pipeline (runs, per-orientation outcomes, stage durations)
//! - Publisher (attempts, retries)
//! - External services (media host requests, credential vault)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs total by result.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipforge_pipeline_runs_total", "Total pipeline runs"),
        &["result"], // "completed", "aborted"
    )
    .unwrap()
});

/// Renditions produced total by orientation and outcome.
pub static RENDITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "clipforge_renditions_total",
            "Total orientation chains by outcome",
        ),
        &["orientation", "result"], // result: "success", "error"
    )
    .unwrap()
});

/// Transform stage duration in seconds.
pub static TRANSFORM_STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipforge_transform_stage_duration_seconds",
            "Duration of individual ffmpeg stages",
        )
        .buckets(vec![
            0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
        ]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Publisher Metrics
// =============================================================================

/// Publish attempts total by service and result.
pub static PUBLISH_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipforge_publish_attempts_total", "Total publish attempts"),
        &["service", "result"], // result: "success", "error"
    )
    .unwrap()
});

/// Retry requests accepted by the publisher.
pub static PUBLISH_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipforge_publish_retries_total",
        "Total publish retries started",
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipforge_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "clipforge_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Stored credentials that could not be decrypted.
pub static CREDENTIAL_DECRYPT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipforge_credential_decrypt_failures_total",
        "Total stored credentials that failed to decrypt",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(RENDITIONS_TOTAL.clone()),
        Box::new(TRANSFORM_STAGE_DURATION.clone()),
        // Publisher
        Box::new(PUBLISH_ATTEMPTS.clone()),
        Box::new(PUBLISH_RETRIES.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
        Box::new(CREDENTIAL_DECRYPT_FAILURES.clone()),
    ]
}
