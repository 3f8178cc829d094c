//! REST API Routes Module
//!
//! Includes:
//! - User lookups (`/user?id=N`, `/users/:id`)
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod health;
pub mod user;

use std::time::Duration;

use axum::{
    http::{header, Method},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::constants::X_CACHE_HEADER;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Handler for GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the CORS layer from configuration.
///
/// An empty origin list allows every origin (development mode); otherwise
/// origins are matched by [`ApiConfig::is_origin_allowed`], which also
/// understands `*.domain` entries.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::HeaderName::from_static(X_CACHE_HEADER)])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let config = config.clone();
        cors.allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin
                .to_str()
                .map(|o| config.is_origin_allowed(o))
                .unwrap_or(false)
        }))
    }
}

/// Create the complete API router.
///
/// - User lookups at /user and /users/:id
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI document at /openapi.json
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    Router::new()
        .merge(user::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .layer(from_fn_with_state(
            state.metrics.clone(),
            observability_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use lookaside_storage::{CacheStore, InMemoryCache, RecordStore, ResolverConfig};
    use lookaside_test_utils::fixtures::{alice, seeded_store};
    use lookaside_test_utils::{FailingCache, FailingStore, SlowStore};
    use lookaside_core::User;
    use tower::ServiceExt; // for `oneshot`

    use crate::error::{ApiError, ErrorCode};
    use crate::routes::health::{HealthResponse, HealthStatus};

    fn app_with(store: Arc<dyn RecordStore<User>>, cache: Arc<dyn CacheStore>, config: ApiConfig) -> Router {
        let state =
            AppState::from_backends(store, cache, ResolverConfig::default(), config).unwrap();
        create_api_router(state)
    }

    fn seeded_app() -> (Arc<InMemoryCache>, Router) {
        let cache = Arc::new(InMemoryCache::new());
        let app = app_with(Arc::new(seeded_store()), cache.clone(), ApiConfig::default());
        (cache, app)
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn x_cache(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(X_CACHE_HEADER)
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_user_lookup_miss_then_hit() {
        let (cache, app) = seeded_app();

        let first = get(&app, "/user?id=1").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(x_cache(&first), Some("miss"));
        assert_eq!(json::<User>(first).await, alice());
        assert!(cache.contains_key("1"));

        let second = get(&app, "/users/1").await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(x_cache(&second), Some("hit"));
        assert_eq!(json::<User>(second).await, alice());
    }

    #[tokio::test]
    async fn test_user_body_is_row_shape() {
        let (_, app) = seeded_app();
        let response = get(&app, "/user?id=1").await;
        let body: serde_json::Value = json(response).await;
        assert_eq!(body, serde_json::json!({"id": 1, "name": "Alice", "age": 30}));
    }

    #[tokio::test]
    async fn test_unknown_user_is_404_and_not_cached() {
        let (cache, app) = seeded_app();

        let response = get(&app, "/users/999").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json::<ApiError>(response).await.code, ErrorCode::UserNotFound);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_ids_are_400() {
        let (_, app) = seeded_app();

        let cases = [
            ("/user", ErrorCode::MissingField),
            ("/user?id=", ErrorCode::MissingField),
            ("/user?id=abc", ErrorCode::InvalidFormat),
            ("/users/abc", ErrorCode::InvalidFormat),
            ("/user?id=0", ErrorCode::InvalidRange),
            ("/users/-5", ErrorCode::InvalidRange),
        ];

        for (uri, code) in cases {
            let response = get(&app, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json::<ApiError>(response).await.code, code, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_store_unavailable_is_503() {
        let app = app_with(
            Arc::new(FailingStore::unavailable()),
            Arc::new(InMemoryCache::new()),
            ApiConfig::default(),
        );

        let response = get(&app, "/user?id=1").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json::<ApiError>(response).await.code,
            ErrorCode::ServiceUnavailable
        );
    }

    #[tokio::test]
    async fn test_cache_outage_still_serves_from_store() {
        let app = app_with(
            Arc::new(seeded_store()),
            Arc::new(FailingCache::down()),
            ApiConfig::default(),
        );

        let response = get(&app, "/user?id=1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(x_cache(&response), Some("miss"));
        assert_eq!(json::<User>(response).await, alice());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_hits_request_deadline() {
        let config = ApiConfig {
            request_timeout: Duration::from_millis(100),
            ..ApiConfig::default()
        };
        let store = SlowStore::new(seeded_store(), Duration::from_secs(5));
        let app = app_with(Arc::new(store), Arc::new(InMemoryCache::new()), config);

        let response = get(&app, "/user?id=1").await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json::<ApiError>(response).await.code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn test_readiness_healthy() {
        let (_, app) = seeded_app();

        let response = get(&app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthResponse = json(response).await;
        assert_eq!(body.status, HealthStatus::Healthy);
        assert_eq!(body.details.unwrap().cache_backend, "memory");
    }

    #[tokio::test]
    async fn test_readiness_degraded_when_cache_down() {
        let app = app_with(
            Arc::new(seeded_store()),
            Arc::new(FailingCache::down()),
            ApiConfig::default(),
        );

        let response = get(&app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthResponse = json(response).await;
        assert_eq!(body.status, HealthStatus::Degraded);
        assert!(body.details.unwrap().cache.error.is_some());
    }

    #[tokio::test]
    async fn test_readiness_unhealthy_when_store_down() {
        let app = app_with(
            Arc::new(FailingStore::unavailable()),
            Arc::new(InMemoryCache::new()),
            ApiConfig::default(),
        );

        let response = get(&app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: HealthResponse = json(response).await;
        assert_eq!(body.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_ping_and_live() {
        let (_, app) = seeded_app();
        assert_eq!(get(&app, "/health/ping").await.status(), StatusCode::OK);
        assert_eq!(get(&app, "/health/live").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_reflect_lookups() {
        let (_, app) = seeded_app();
        get(&app, "/user?id=1").await;
        get(&app, "/user?id=1").await;
        get(&app, "/user?id=404").await;

        let response = get(&app, "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.contains(r#"lookaside_lookups_total{source="store"} 1"#));
        assert!(text.contains(r#"lookaside_lookups_total{source="cache"} 1"#));
        assert!(text.contains(r#"lookaside_lookups_total{source="absent"} 1"#));
        assert!(text.contains(r#"path="/user""#));
    }

    #[tokio::test]
    async fn test_junk_paths_do_not_grow_metric_series() {
        let (_, app) = seeded_app();
        for i in 0..200 {
            get(&app, &format!("/users/x{i}")).await;
            get(&app, &format!("/nope-{i}")).await;
        }

        let response = get(&app, "/metrics").await;
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let series: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with("lookaside_http_requests_total{"))
            .collect();

        assert_eq!(series.len(), 2, "{series:?}");
        assert!(text.contains(r#"path="/users/:id",status="400"} 200"#));
        assert!(text.contains(r#"path="unmatched",status="404"} 200"#));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_new_lookups() {
        let store = Arc::new(lookaside_test_utils::CountingStore::new(seeded_store()));
        let state = AppState::from_backends(
            store.clone(),
            Arc::new(InMemoryCache::new()),
            ResolverConfig::default(),
            ApiConfig::default(),
        )
        .unwrap();
        let shutdown = state.shutdown.clone();
        let app = create_api_router(state);

        shutdown.cancel();

        let response = get(&app, "/user?id=1").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json::<ApiError>(response).await.code,
            ErrorCode::RequestCancelled
        );
        assert_eq!(store.fetches(), 0);
    }

    #[tokio::test]
    async fn test_openapi_json_served() {
        let (_, app) = seeded_app();
        let response = get(&app, "/openapi.json").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json(response).await;
        assert!(body["paths"].get("/users/{id}").is_some());
    }

    #[tokio::test]
    async fn test_cors_rejects_unlisted_origin() {
        let config = ApiConfig {
            cors_origins: vec!["*.example.com".to_string()],
            ..ApiConfig::default()
        };
        let app = app_with(
            Arc::new(seeded_store()),
            Arc::new(InMemoryCache::new()),
            config,
        );

        let request = |origin: &str| {
            Request::builder()
                .uri("/health/ping")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app.clone().oneshot(request("https://app.example.com")).await.unwrap();
        assert!(allowed
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let denied = app.oneshot(request("https://evil.test")).await.unwrap();
        assert!(!denied
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
