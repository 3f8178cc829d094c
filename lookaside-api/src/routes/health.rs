//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Store and cache connectivity check
//!
//! A cache outage only degrades readiness: lookups keep working against the
//! store, just slower.

use std::future::Future;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use lookaside_core::{Interrupted, RequestContext};
use serde::{Deserialize, Serialize};

use crate::constants::HEALTH_CHECK_TIMEOUT_MS;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthDetails {
    pub store: ComponentHealth,
    pub cache: ComponentHealth,
    /// Cache backend in use ("redis", "memory")
    pub cache_backend: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_probe(result: Result<u64, String>, failed: HealthStatus) -> Self {
        match result {
            Ok(latency) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(latency),
                error: None,
            },
            Err(e) => Self {
                status: failed,
                latency_ms: None,
                error: Some(e),
            },
        }
    }
}

/// Overall status: the store decides readiness, the cache only degrades it.
fn overall_status(store: HealthStatus, cache: HealthStatus) -> HealthStatus {
    match (store, cache) {
        (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
        (HealthStatus::Healthy, _) => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
)]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
)]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (store and cache connectivity)
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready, possibly without its cache", body = HealthResponse),
        (status = 503, description = "Store is unreachable", body = HealthResponse),
    ),
)]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state
        .shutdown
        .child(Some(Duration::from_millis(HEALTH_CHECK_TIMEOUT_MS)));
    let store = state.resolver.store();
    let cache = state.resolver.cache();

    let (store_probe, cache_probe) = tokio::join!(
        probe(&ctx, store.health_check(&ctx)),
        probe(&ctx, cache.health_check(&ctx)),
    );

    let store_health = ComponentHealth::from_probe(store_probe, HealthStatus::Unhealthy);
    let cache_health = ComponentHealth::from_probe(cache_probe, HealthStatus::Degraded);
    let status = overall_status(store_health.status, cache_health.status);

    if status != HealthStatus::Healthy {
        tracing::warn!(
            store = ?store_health.error,
            cache = ?cache_health.error,
            "readiness check not healthy"
        );
    }

    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            store: store_health,
            cache: cache_health,
            cache_backend: cache.backend_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

/// Time a health probe, bounded by the context deadline.
async fn probe<F, E>(ctx: &RequestContext, check: F) -> Result<u64, String>
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    match ctx.run(check).await {
        Ok(Ok(())) => Ok(start.elapsed().as_millis() as u64),
        Ok(Err(e)) => Err(e.to_string()),
        Err(Interrupted::DeadlineExceeded) => Err(format!(
            "no response within {}ms",
            HEALTH_CHECK_TIMEOUT_MS
        )),
        Err(Interrupted::Cancelled) => Err("check cancelled".to_string()),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
