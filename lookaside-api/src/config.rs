//! API Configuration Module
//!
//! Server, CORS, cache backend and resolver settings. Configuration is
//! loaded from environment variables with sensible defaults for development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use lookaside_core::ConfigError;
use lookaside_storage::ResolverConfig;

use crate::constants::{
    DEFAULT_API_PORT, DEFAULT_BIND_HOST, DEFAULT_CACHE_TTL_SECS, DEFAULT_CORS_MAX_AGE_SECS,
    DEFAULT_REQUEST_TIMEOUT_MS,
};

/// Which cache backend the resolver runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    /// Shared Redis instance.
    #[default]
    Redis,
    /// Process-local cache; nothing is shared between replicas.
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "LOOKASIDE_CACHE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected 'redis' or 'memory'".to_string(),
            }),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    /// Deadline applied to every lookup.
    pub request_timeout: Duration,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    pub cache_backend: CacheBackendKind,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_API_PORT,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            cache_backend: CacheBackendKind::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LOOKASIDE_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` or `LOOKASIDE_API_PORT`: Listen port (default: 8080)
    /// - `LOOKASIDE_REQUEST_TIMEOUT_MS`: Per-lookup deadline (default: 5000)
    /// - `LOOKASIDE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `LOOKASIDE_CACHE_BACKEND`: "redis" or "memory" (default: redis)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_host = lookup("LOOKASIDE_API_BIND").unwrap_or(defaults.bind_host);

        let port = match lookup("PORT").or_else(|| lookup("LOOKASIDE_API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.port,
        };

        let timeout_ms: u64 = parse_or(&lookup, "LOOKASIDE_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "LOOKASIDE_REQUEST_TIMEOUT_MS".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let cors_origins = lookup("LOOKASIDE_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cache_backend = match lookup("LOOKASIDE_CACHE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.cache_backend,
        };

        Ok(Self {
            bind_host,
            port,
            request_timeout: Duration::from_millis(timeout_ms),
            cors_origins,
            cors_max_age_secs: defaults.cors_max_age_secs,
            cache_backend,
        })
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| ConfigError::InvalidValue {
            field: "LOOKASIDE_API_BIND".to_string(),
            value: addr.clone(),
            reason: e.to_string(),
        })
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

// ============================================================================
// RESOLVER CONFIGURATION
// ============================================================================

/// Resolver settings from environment variables.
///
/// - `LOOKASIDE_CACHE_TTL_SECS`: Entry lifetime, the staleness bound (default: 10)
/// - `LOOKASIDE_CACHE_KEY_PREFIX`: Namespace for cache keys (default: empty)
pub fn resolver_config_from_env() -> Result<ResolverConfig, ConfigError> {
    resolver_config_from_lookup(|key| std::env::var(key).ok())
}

pub fn resolver_config_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ResolverConfig, ConfigError> {
    let ttl_secs: u64 = parse_or(&lookup, "LOOKASIDE_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
    let config = ResolverConfig::new()
        .with_ttl(Duration::from_secs(ttl_secs))
        .with_key_prefix(lookup("LOOKASIDE_CACHE_KEY_PREFIX").unwrap_or_default());
    config.validate().map_err(|e| {
        let ConfigError::InvalidValue { reason, .. } = e;
        ConfigError::InvalidValue {
            field: "LOOKASIDE_CACHE_TTL_SECS".to_string(),
            value: ttl_secs.to_string(),
            reason,
        }
    })?;
    Ok(config)
}

// ============================================================================
// HELPERS
// ============================================================================

pub(crate) fn parse_value<T>(field: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(field) {
        Some(raw) => parse_value(field, &raw),
        None => Ok(default),
    }
}
