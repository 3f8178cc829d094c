//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Provides automatic instrumentation of all HTTP requests with:
//! - A server span parented on the incoming traceparent header
//! - Prometheus metrics collection
//! - Request completion logging

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::{global, Context};
use opentelemetry_http::HeaderExtractor;
use tracing::{field, info_span, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::metrics::ApiMetrics;

/// Route label for requests no route matched, so junk paths share one series.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Extract trace context from incoming request headers.
fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Route template for metric labels and span names, e.g. `/users/:id`.
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Observability middleware for Axum.
///
/// Wraps every request with:
/// 1. A tracing span exported through OpenTelemetry
/// 2. Prometheus metrics recording
/// 3. Request/response logging
pub async fn observability_middleware(
    State(metrics): State<Arc<ApiMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let span = info_span!(
        "http_request",
        otel.name = %format!("{} {}", method, route),
        otel.kind = "server",
        otel.status_code = field::Empty,
        http.method = %method,
        http.target = %path,
        http.route = %route,
        http.status_code = field::Empty,
    );
    if let Err(e) = span.set_parent(extract_trace_context(request.headers())) {
        tracing::debug!(error = ?e, "Failed to attach remote trace context");
    }

    let response = next.run(request).instrument(span.clone()).await;

    let duration = start.elapsed();
    let status = response.status();

    metrics.record_http_request(
        method.as_str(),
        &route,
        status.as_u16(),
        duration.as_secs_f64(),
    );

    span.record("http.status_code", status.as_u16());
    span.record(
        "otel.status_code",
        if status.is_server_error() { "ERROR" } else { "OK" },
    );

    tracing::info!(
        parent: &span,
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt; // for `oneshot`

    fn instrumented(metrics: Arc<ApiMetrics>) -> Router {
        Router::new()
            .route("/items/:id", get(|| async { "ok" }))
            .layer(from_fn_with_state(metrics, observability_middleware))
    }

    async fn send(app: &Router, uri: &str) {
        app.clone()
            .oneshot(http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn test_route_label_without_match_is_unmatched() {
        let request = http::Request::builder().uri("/nope").body(Body::empty()).unwrap();
        assert_eq!(route_label(&request), UNMATCHED_ROUTE);
    }

    #[tokio::test]
    async fn test_matched_requests_share_route_template() {
        let metrics = Arc::new(ApiMetrics::new().unwrap());
        let app = instrumented(metrics.clone());

        send(&app, "/items/1").await;
        send(&app, "/items/abc").await;

        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "/items/:id", "200"])
            .get();
        assert_eq!(count, 2.0);
    }

    #[tokio::test]
    async fn test_unrouted_requests_share_one_series() {
        let metrics = Arc::new(ApiMetrics::new().unwrap());
        let app = instrumented(metrics.clone());

        for i in 0..50 {
            send(&app, &format!("/junk-{i}")).await;
        }

        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", UNMATCHED_ROUTE, "404"])
            .get();
        assert_eq!(count, 50.0);
    }
}
