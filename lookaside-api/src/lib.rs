//! Lookaside API - HTTP Service and Network Adapters
//!
//! Serves user lookups over REST (Axum) through the cache-aside
//! [`Resolver`](lookaside_storage::Resolver), backed by PostgreSQL
//! (deadpool-postgres) and Redis. Also carries the service plumbing:
//! environment configuration, OpenTelemetry tracing, Prometheus metrics and
//! health probes.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod macros;
pub mod openapi;
pub mod redis_cache;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{resolver_config_from_env, ApiConfig, CacheBackendKind};
pub use db::{DbConfig, PgUserStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use redis_cache::{RedisCache, RedisConfig};
pub use routes::create_api_router;
pub use state::{AppState, UserResolver};
