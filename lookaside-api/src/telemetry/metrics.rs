//! Prometheus Metrics Definitions
//!
//! Defines the service metrics with appropriate labels and types, held in a
//! registry owned by [`ApiMetrics`]. Exposes a /metrics endpoint for
//! Prometheus scraping.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Lookup outcome labels beyond the two [`LookupSource`](lookaside_storage::LookupSource) values.
pub const OUTCOME_ABSENT: &str = "absent";
pub const OUTCOME_ERROR: &str = "error";

/// Container for all service metrics.
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,

    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Lookup outcome counter - labels: source (cache, store, absent, error)
    pub lookups_total: CounterVec,

    /// Absorbed cache fault counter - labels: kind
    pub cache_faults_total: CounterVec,
}

impl ApiMetrics {
    /// Create all metrics and register them with a fresh registry.
    pub fn new() -> ApiResult<Self> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("lookaside_http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )
        .map_err(|e| registration_error("http_requests_total", e))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lookaside_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(HTTP_LATENCY_BUCKETS.to_vec()),
            &["method", "path"],
        )
        .map_err(|e| registration_error("http_request_duration_seconds", e))?;

        let lookups_total = CounterVec::new(
            Opts::new("lookaside_lookups_total", "Total number of lookups by outcome"),
            &["source"],
        )
        .map_err(|e| registration_error("lookups_total", e))?;

        let cache_faults_total = CounterVec::new(
            Opts::new(
                "lookaside_cache_faults_total",
                "Cache faults absorbed by the resolver",
            ),
            &["kind"],
        )
        .map_err(|e| registration_error("cache_faults_total", e))?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(|e| registration_error("http_requests_total", e))?;
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .map_err(|e| registration_error("http_request_duration_seconds", e))?;
        registry
            .register(Box::new(lookups_total.clone()))
            .map_err(|e| registration_error("lookups_total", e))?;
        registry
            .register(Box::new(cache_faults_total.clone()))
            .map_err(|e| registration_error("cache_faults_total", e))?;

        #[cfg(target_os = "linux")]
        registry
            .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))
            .map_err(|e| registration_error("process", e))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            lookups_total,
            cache_faults_total,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a lookup outcome.
    pub fn record_lookup(&self, source: &str) {
        self.lookups_total.with_label_values(&[source]).inc();
    }

    /// Record an absorbed cache fault.
    pub fn record_cache_fault(&self, kind: &str) {
        self.cache_faults_total.with_label_values(&[kind]).inc();
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> ApiResult<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ApiError::internal_error(format!("Failed to encode metrics: {}", e)))?;
        Ok(buffer)
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler(State(metrics): State<Arc<ApiMetrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.message.into_bytes(),
            )
        }
    }
}
