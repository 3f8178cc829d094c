//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use lookaside_core::{RequestContext, User};
use lookaside_storage::{CacheStore, RecordStore, Resolver, ResolverConfig};

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::telemetry::ApiMetrics;

/// Resolver over whichever store and cache backends were configured at
/// startup.
pub type UserResolver = Resolver<User, dyn RecordStore<User>, dyn CacheStore>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub resolver: UserResolver,
    pub metrics: Arc<ApiMetrics>,
    pub config: Arc<ApiConfig>,
    /// Root of every per-request context. Cancelling it interrupts all
    /// in-flight lookups.
    pub shutdown: RequestContext,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(resolver: UserResolver, metrics: Arc<ApiMetrics>, config: ApiConfig) -> Self {
        Self {
            resolver,
            metrics,
            config: Arc::new(config),
            shutdown: RequestContext::new(),
            start_time: Instant::now(),
        }
    }

    /// Assemble state from concrete backends with a fresh metrics registry.
    pub fn from_backends(
        store: Arc<dyn RecordStore<User>>,
        cache: Arc<dyn CacheStore>,
        resolver_config: ResolverConfig,
        config: ApiConfig,
    ) -> ApiResult<Self> {
        let resolver = Resolver::new(store, cache, resolver_config);
        Ok(Self::new(resolver, Arc::new(ApiMetrics::new()?), config))
    }

    /// Context for one inbound request, bounded by the configured timeout.
    pub fn request_context(&self) -> RequestContext {
        self.shutdown.child(Some(self.config.request_timeout))
    }
}

crate::impl_from_ref!(UserResolver, resolver);
crate::impl_from_ref!(Arc<ApiMetrics>, metrics);
crate::impl_from_ref!(Arc<ApiConfig>, config);
