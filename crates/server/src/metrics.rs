//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the PersonaForge server:
//! - HTTP request metrics (latency, counts, errors)
//! - WebSocket connection metrics
//! - Run phase, progress and plan item status (collected dynamically)

use once_cell::sync::Lazy;
use personaforge_core::{model::ItemStatus, GenerationPhase};
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

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
            "personaforge_http_request_duration_seconds",
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
        Opts::new("personaforge_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "personaforge_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Commands rejected by the pipeline, by command and reason.
pub static COMMANDS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "personaforge_commands_rejected_total",
            "Pipeline commands rejected at dispatch",
        ),
        &["command", "reason"], // reason: "conflict", "not_found", "invalid", "internal"
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "personaforge_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "personaforge_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "personaforge_ws_messages_sent_total",
            "WebSocket messages sent",
        ),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "personaforge_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Run Metrics (collected dynamically)
// =============================================================================

/// Current run phase (1 for the active phase, 0 otherwise).
pub static RUN_PHASE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("personaforge_run_phase", "Current generation phase"),
        &["phase"],
    )
    .unwrap()
});

/// Progress of the current phase, 0..=100.
pub static RUN_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "personaforge_run_progress",
        "Progress of the current phase in percent",
    )
    .unwrap()
});

/// Whether a guarded operation is running (1) or not (0).
pub static RUN_BUSY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "personaforge_run_busy",
        "Whether a pipeline operation is in progress",
    )
    .unwrap()
});

/// Plan items by status.
pub static PLAN_ITEMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "personaforge_plan_items_by_status",
            "Current plan item count by status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Media executor active jobs.
pub static EXECUTOR_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "personaforge_executor_active",
        "Number of media items currently being produced",
    )
    .unwrap()
});

/// Media executor queued jobs.
pub static EXECUTOR_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "personaforge_executor_queued",
        "Number of media items waiting for a slot",
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
    registry
        .register(Box::new(COMMANDS_REJECTED.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Run
    registry.register(Box::new(RUN_PHASE.clone())).unwrap();
    registry.register(Box::new(RUN_PROGRESS.clone())).unwrap();
    registry.register(Box::new(RUN_BUSY.clone())).unwrap();
    registry
        .register(Box::new(PLAN_ITEMS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(EXECUTOR_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(EXECUTOR_QUEUED.clone()))
        .unwrap();

    // Core metrics (providers, fallbacks, runs, items)
    for metric in personaforge_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

const PHASES: [GenerationPhase; 6] = [
    GenerationPhase::Idle,
    GenerationPhase::IdentityDraft,
    GenerationPhase::ReviewIdentity,
    GenerationPhase::CampaignProduction,
    GenerationPhase::Complete,
    GenerationPhase::Failed,
];

const ITEM_STATUSES: [ItemStatus; 4] = [
    ItemStatus::Empty,
    ItemStatus::Generating,
    ItemStatus::Ready,
    ItemStatus::Failed,
];

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with the current
/// run status, plan and executor pool.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let pipeline = state.pipeline();

    let status = pipeline.status();
    for phase in PHASES {
        RUN_PHASE
            .with_label_values(&[phase.as_str()])
            .set(i64::from(phase == status.phase));
    }
    RUN_PROGRESS.set(i64::from(status.progress));
    RUN_BUSY.set(i64::from(status.busy));

    let pool = pipeline.executor_status();
    EXECUTOR_ACTIVE.set(pool.active_jobs as i64);
    EXECUTOR_QUEUED.set(pool.queued_jobs as i64);

    let results = pipeline.results();
    let mut counts = [0i64; ITEM_STATUSES.len()];
    if let Ok(plan) = results.plan() {
        for item in plan.items() {
            if let Some(slot) = ITEM_STATUSES.iter().position(|s| *s == item.status) {
                counts[slot] += 1;
            }
        }
    }
    for (status, count) in ITEM_STATUSES.iter().zip(counts) {
        PLAN_ITEMS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count);
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    // Run twice: adjacent segments share the separating slash.
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/runs/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/runs/{id}");
    }

    #[test]
    fn test_normalize_path_week_and_item() {
        let path = "/api/v1/plan/weeks/1/items/12/generate";
        assert_eq!(
            normalize_path(path),
            "/api/v1/plan/weeks/{id}/items/{id}/generate"
        );
    }

    #[test]
    fn test_normalize_path_trailing_numeric() {
        let path = "/api/v1/plan/weeks/3/items/0";
        assert_eq!(normalize_path(path), "/api/v1/plan/weeks/{id}/items/{id}");
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
        assert!(output.contains("personaforge_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs metrics that have been accessed
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        WS_CONNECTIONS_ACTIVE.set(0);
        WS_CONNECTIONS_TOTAL.inc();
        RUN_PHASE.with_label_values(&["idle"]).set(1);
        RUN_PROGRESS.set(0);
        PLAN_ITEMS_BY_STATUS.with_label_values(&["ready"]).set(0);
        EXECUTOR_ACTIVE.set(0);
        personaforge_core::metrics::RUNS
            .with_label_values(&["started"])
            .inc_by(0);

        let output = encode_metrics();

        assert!(output.contains("personaforge_http_request_duration_seconds"));
        assert!(output.contains("personaforge_http_requests_in_flight"));
        assert!(output.contains("personaforge_ws_connections_active"));
        assert!(output.contains("personaforge_ws_connections_total"));
        assert!(output.contains("personaforge_run_phase"));
        assert!(output.contains("personaforge_run_progress"));
        assert!(output.contains("personaforge_plan_items_by_status"));
        assert!(output.contains("personaforge_executor_active"));
        assert!(output.contains("personaforge_runs_total"));
    }
}
