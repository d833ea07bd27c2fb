//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Provider calls (requests, latency, classified failures, retries)
//! - Capability fallbacks
//! - Generation runs and plan items

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Provider Metrics
// =============================================================================

/// Provider call attempts by operation and outcome.
pub static PROVIDER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "personaforge_provider_requests_total",
            "Total provider call attempts",
        ),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Provider call latency in seconds.
pub static PROVIDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "personaforge_provider_duration_seconds",
            "Duration of a single provider call attempt",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["operation"],
    )
    .unwrap()
});

/// Provider failures by classification.
pub static PROVIDER_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "personaforge_provider_failures_total",
            "Provider failures by error category",
        ),
        &["operation", "category"],
    )
    .unwrap()
});

/// Backoff retries scheduled.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "personaforge_retry_attempts_total",
            "Total retries after rate limiting",
        ),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Fallback Metrics
// =============================================================================

/// Capability fallbacks taken.
pub static FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "personaforge_fallbacks_total",
            "Capability fallbacks taken",
        ),
        &["kind"], // "secondary_image_model", "slideshow", "slide_substitute"
    )
    .unwrap()
});

// =============================================================================
// Run Metrics
// =============================================================================

/// Run lifecycle events.
pub static RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("personaforge_runs_total", "Generation run lifecycle events"),
        &["event"], // "started", "identity_ready", "completed", "failed", "reset"
    )
    .unwrap()
});

/// Plan items settled by result and asset kind.
pub static ITEMS_PRODUCED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "personaforge_items_produced_total",
            "Plan items whose media generation settled",
        ),
        &["result", "kind"],
    )
    .unwrap()
});

/// Items currently being produced by the bounded executor.
pub static ITEMS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "personaforge_items_in_flight",
        "Plan items currently in flight",
    )
    .unwrap()
});

/// Duration of run phases in seconds.
pub static PHASE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "personaforge_phase_duration_seconds",
            "Duration of identity and production phases",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["phase", "result"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Providers
        Box::new(PROVIDER_REQUESTS.clone()),
        Box::new(PROVIDER_DURATION.clone()),
        Box::new(PROVIDER_FAILURES.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        // Fallbacks
        Box::new(FALLBACKS.clone()),
        // Runs
        Box::new(RUNS.clone()),
        Box::new(ITEMS_PRODUCED.clone()),
        Box::new(ITEMS_IN_FLIGHT.clone()),
        Box::new(PHASE_DURATION.clone()),
    ]
}
