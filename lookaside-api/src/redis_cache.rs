//! Redis Cache Backend
//!
//! [`CacheStore`] over a shared Redis instance. Entries are written with a
//! millisecond expiry (`SET key value PX ttl`), so Redis itself enforces the
//! staleness bound.

use std::time::Duration;

use async_trait::async_trait;
use lookaside_core::{CacheError, ConfigError, RequestContext};
use lookaside_storage::{CacheKey, CacheStore};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};
use tracing::Instrument;

use crate::config::parse_or;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Timeout for a single command round trip
    pub response_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(1),
        }
    }
}

impl RedisConfig {
    /// Create a Redis configuration from environment variables.
    ///
    /// - `LOOKASIDE_REDIS_URL` (default: redis://127.0.0.1:6379)
    /// - `LOOKASIDE_REDIS_TIMEOUT_MS`: command timeout (default: 1000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let response_ms = parse_or(
            &lookup,
            "LOOKASIDE_REDIS_TIMEOUT_MS",
            defaults.response_timeout.as_millis() as u64,
        )?;

        Ok(Self {
            url: lookup("LOOKASIDE_REDIS_URL").unwrap_or(defaults.url),
            connect_timeout: defaults.connect_timeout,
            response_timeout: Duration::from_millis(response_ms),
        })
    }
}

/// Cache backend holding a multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis. Fails if the first connection cannot be made.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str()).map_err(|e| CacheError::Unavailable {
            reason: format!("Invalid Redis URL: {}", e),
        })?;

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connect_timeout)
            .set_response_timeout(config.response_timeout);

        let conn = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(|e| CacheError::Unavailable {
                reason: e.to_string(),
            })?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &CacheKey, _ctx: &RequestContext) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        let span = tracing::debug_span!("redis.get", db.system = "redis", key = %key);
        conn.get::<_, Option<Vec<u8>>>(key.as_str())
            .instrument(span)
            .await
            .map_err(|e| command_error("GET", e))
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        _ctx: &RequestContext,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let ttl_ms = ttl_millis(ttl);
        let span = tracing::debug_span!("redis.set", db.system = "redis", key = %key, ttl_ms);
        conn.pset_ex::<_, _, ()>(key.as_str(), value, ttl_ms)
            .instrument(span)
            .await
            .map_err(|e| command_error("SET", e))
    }

    async fn health_check(&self, _ctx: &RequestContext) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("PING", e))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Redis rejects a zero expiry, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn command_error(command: &str, err: RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        CacheError::Unavailable {
            reason: err.to_string(),
        }
    } else {
        CacheError::CommandFailed {
            command: command.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
    }

    #[test]
    fn test_default_redis_config() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.response_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_redis_config_from_lookup() {
        let config = RedisConfig::from_lookup(|key| match key {
            "LOOKASIDE_REDIS_URL" => Some("redis://cache:6380/1".to_string()),
            "LOOKASIDE_REDIS_TIMEOUT_MS" => Some("250".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.url, "redis://cache:6380/1");
        assert_eq!(config.response_timeout, Duration::from_millis(250));

        let config = RedisConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.response_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_redis_config_rejects_bad_timeout() {
        let err = RedisConfig::from_lookup(|key| {
            (key == "LOOKASIDE_REDIS_TIMEOUT_MS").then(|| "1s".to_string())
        })
        .unwrap_err();
        let ConfigError::InvalidValue { field, value, .. } = err;
        assert_eq!(field, "LOOKASIDE_REDIS_TIMEOUT_MS");
        assert_eq!(value, "1s");
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let config = RedisConfig {
            url: "not-a-url".to_string(),
            ..RedisConfig::default()
        };
        let err = RedisCache::connect(&config).await.err();
        assert!(matches!(err, Some(CacheError::Unavailable { .. })));
    }
}
