//! Lookaside API Server Entry Point
//!
//! Bootstraps configuration, connects the store and cache backends, and
//! starts the Axum HTTP server.

use std::sync::Arc;
use std::time::Duration;

use lookaside_api::constants::MEMORY_CACHE_PURGE_INTERVAL_SECS;
use lookaside_api::telemetry::{init_tracer, TelemetryConfig};
use lookaside_api::{
    create_api_router, resolver_config_from_env, ApiConfig, ApiError, ApiResult, AppState,
    CacheBackendKind, DbConfig, PgUserStore, RedisCache, RedisConfig,
};
use lookaside_core::{RequestContext, User};
use lookaside_storage::{CacheStore, InMemoryCache, RecordStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let tracer = init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let resolver_config = resolver_config_from_env()?;

    let store: Arc<dyn RecordStore<User>> =
        Arc::new(PgUserStore::from_config(&DbConfig::from_env()?)?);
    let cache = connect_cache(api_config.cache_backend).await?;

    tracing::info!(
        cache_backend = cache.backend_name(),
        ttl_ms = resolver_config.ttl.as_millis() as u64,
        key_prefix = %resolver_config.key_prefix,
        "Resolver configured"
    );

    let addr = api_config.bind_addr()?;
    let state = AppState::from_backends(store, cache, resolver_config, api_config)?;
    let shutdown = state.shutdown.clone();
    let app = create_api_router(state);

    tracing::info!(%addr, "Starting Lookaside API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracer.shutdown();
    Ok(())
}

/// Connect the configured cache backend.
///
/// An unreachable Redis falls back to a process-local cache; the cache is
/// never a reason to refuse to start. Malformed Redis settings are.
async fn connect_cache(kind: CacheBackendKind) -> ApiResult<Arc<dyn CacheStore>> {
    if kind == CacheBackendKind::Redis {
        let redis_config = RedisConfig::from_env()?;
        match RedisCache::connect(&redis_config).await {
            Ok(cache) => return Ok(Arc::new(cache)),
            Err(e) => tracing::warn!(
                error = %e,
                url = %redis_config.url,
                "Redis unavailable, falling back to in-memory cache"
            ),
        }
    }

    let cache = Arc::new(InMemoryCache::new());
    spawn_purge_task(Arc::clone(&cache));
    Ok(cache)
}

/// Periodically drop expired entries so the in-memory cache stays bounded
/// by the live working set.
fn spawn_purge_task(cache: Arc<InMemoryCache>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(MEMORY_CACHE_PURGE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match cache.purge_expired() {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Purged expired cache entries"),
                Err(e) => tracing::warn!(error = %e, "Cache purge failed"),
            }
        }
    });
}

/// Resolve on ctrl-c, cancelling every in-flight request context so
/// draining does not wait on slow backends.
async fn shutdown_signal(root: RequestContext) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
    root.cancel();
}
