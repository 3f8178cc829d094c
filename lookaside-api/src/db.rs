//! PostgreSQL Record Store
//!
//! Connection pooling via deadpool-postgres and the [`RecordStore`]
//! implementation serving users from the `users` table.

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Object, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use lookaside_core::{ConfigError, RequestContext, StoreError, User, UserId};
use lookaside_storage::RecordStore;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};
use tracing::Instrument;

use crate::config::parse_or;

const FETCH_USER_SQL: &str =
    "SELECT id::int8 AS id, name, age::int4 AS age FROM users WHERE id = $1::int8";

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the discrete fields
    pub url: Option<String>,
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait, create and recycle timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "lookaside".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// - `LOOKASIDE_DATABASE_URL`: Full connection URL (overrides the fields below)
    /// - `LOOKASIDE_DB_HOST`, `LOOKASIDE_DB_PORT`, `LOOKASIDE_DB_NAME`,
    ///   `LOOKASIDE_DB_USER`, `LOOKASIDE_DB_PASSWORD`
    /// - `LOOKASIDE_DB_POOL_SIZE`: Maximum pool size (default: 16)
    /// - `LOOKASIDE_DB_TIMEOUT`: Pool timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are rejected rather than defaulted.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timeout_secs = parse_or(&lookup, "LOOKASIDE_DB_TIMEOUT", defaults.timeout.as_secs())?;

        Ok(Self {
            url: lookup("LOOKASIDE_DATABASE_URL"),
            host: lookup("LOOKASIDE_DB_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "LOOKASIDE_DB_PORT", defaults.port)?,
            dbname: lookup("LOOKASIDE_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("LOOKASIDE_DB_USER").unwrap_or(defaults.user),
            password: lookup("LOOKASIDE_DB_PASSWORD").unwrap_or_default(),
            max_size: parse_or(&lookup, "LOOKASIDE_DB_POOL_SIZE", defaults.max_size)?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened here; the first checkout connects.
    pub fn create_pool(&self) -> Result<Pool, StoreError> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts {
                wait: Some(self.timeout),
                create: Some(self.timeout),
                recycle: Some(self.timeout),
            },
            ..Default::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

// ============================================================================
// USER STORE
// ============================================================================

/// Authoritative user store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a store from configuration.
    pub fn from_config(config: &DbConfig) -> Result<Self, StoreError> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> Result<Object, StoreError> {
        self.pool.get().await.map_err(pool_error)
    }
}

#[async_trait]
impl RecordStore<User> for PgUserStore {
    async fn fetch_by_id(&self, id: UserId, _ctx: &RequestContext) -> Result<Option<User>, StoreError> {
        let span = tracing::debug_span!("pg.fetch_by_id", db.system = "postgresql", user_id = %id);
        async {
            let conn = self.get_conn().await?;
            let row = conn
                .query_opt(FETCH_USER_SQL, &[&id.get()])
                .await
                .map_err(query_error)?;

            row.map(|row| user_from_row(id, &row)).transpose()
        }
        .instrument(span)
        .await
    }

    async fn health_check(&self, _ctx: &RequestContext) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(query_error)?;
        Ok(())
    }
}

fn user_from_row(id: UserId, row: &Row) -> Result<User, StoreError> {
    let malformed = |e: tokio_postgres::Error| StoreError::MalformedRow {
        id: id.to_string(),
        reason: e.to_string(),
    };

    Ok(User {
        id: UserId::new(row.try_get::<_, i64>("id").map_err(malformed)?),
        name: row.try_get::<_, String>("name").map_err(malformed)?,
        age: row.try_get::<_, i32>("age").map_err(malformed)?,
    })
}

/// Pool checkout failures mean the database cannot be reached right now.
fn pool_error(err: PoolError) -> StoreError {
    match err {
        PoolError::Timeout(kind) => StoreError::Unavailable {
            reason: format!("Connection pool timed out ({:?})", kind),
        },
        PoolError::Closed => StoreError::Unavailable {
            reason: "Database connection pool is closed".to_string(),
        },
        PoolError::Backend(e) => StoreError::Unavailable {
            reason: e.to_string(),
        },
        other => StoreError::QueryFailed {
            reason: other.to_string(),
        },
    }
}

fn query_error(err: tokio_postgres::Error) -> StoreError {
    if err.is_closed() {
        StoreError::Unavailable {
            reason: err.to_string(),
        }
    } else {
        StoreError::QueryFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_config() {
        let config = DbConfig::default();
        assert!(config.url.is_none());
        assert_eq!(config.port, 5432);
        assert_eq!(config.max_size, 16);
    }

    #[tokio::test]
    async fn test_create_pool_does_not_connect() {
        let config = DbConfig {
            port: 1,
            ..DbConfig::default()
        };
        let store = PgUserStore::from_config(&config).unwrap();
        assert_eq!(store.pool_size(), 0);
    }

    #[test]
    fn test_db_config_from_lookup() {
        let config = DbConfig::from_lookup(|key| match key {
            "LOOKASIDE_DB_HOST" => Some("db.internal".to_string()),
            "LOOKASIDE_DB_PORT" => Some("6432".to_string()),
            "LOOKASIDE_DB_POOL_SIZE" => Some("4".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6432);
        assert_eq!(config.max_size, 4);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_db_config_rejects_unparseable_numbers() {
        for field in ["LOOKASIDE_DB_PORT", "LOOKASIDE_DB_POOL_SIZE", "LOOKASIDE_DB_TIMEOUT"] {
            let err = DbConfig::from_lookup(|key| (key == field).then(|| "lots".to_string()))
                .unwrap_err();
            let ConfigError::InvalidValue { field: rejected, value, .. } = err;
            assert_eq!(rejected, field);
            assert_eq!(value, "lots");
        }
    }

    #[test]
    fn test_pool_closed_is_unavailable() {
        assert!(matches!(pool_error(PoolError::Closed), StoreError::Unavailable { .. }));
    }

    #[test]
    fn test_fetch_query_selects_by_id() {
        assert!(FETCH_USER_SQL.contains("FROM users WHERE id = $1"));
    }
}
