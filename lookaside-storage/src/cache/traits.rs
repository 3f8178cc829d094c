//! Collaborator traits and cacheable record marker.
//!
//! The resolver consumes exactly two capabilities: a [`RecordStore`] that
//! is authoritative, and a [`CacheStore`] that is fast but may lose, expire
//! or corrupt entries at any time. Both receive the caller's
//! [`RequestContext`] so network adapters can honor its deadline natively.

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use lookaside_core::{CacheError, RequestContext, StoreError, User, UserId};
use serde::{de::DeserializeOwned, Serialize};

/// Marker trait for records that can be served through the resolver.
///
/// # Implementation Requirements
///
/// - `record_id()` must return the identifier the record was fetched by
/// - The serialized form must carry the identifier and every payload field,
///   so that decoding an encoded record yields an equal record
pub trait CacheableRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Store-assigned identifier, the sole lookup key.
    type Id: Copy + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Short lowercase name used in logs and metric labels.
    fn entity_name() -> &'static str;

    /// Identifier of this record.
    fn record_id(&self) -> Self::Id;
}

impl CacheableRecord for User {
    type Id = UserId;

    fn entity_name() -> &'static str {
        "user"
    }

    fn record_id(&self) -> UserId {
        self.id
    }
}

/// Key of a cache entry: the string form of a record id, optionally behind
/// a namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for `id`. An empty prefix yields the bare id, so id 1
    /// is stored under `"1"`.
    pub fn for_id(prefix: &str, id: impl fmt::Display) -> Self {
        if prefix.is_empty() {
            Self(id.to_string())
        } else {
            Self(format!("{}{}", prefix, id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Authoritative record store.
#[async_trait]
pub trait RecordStore<R: CacheableRecord>: Send + Sync {
    /// Fetch a record by id.
    ///
    /// Returns `Ok(None)` when no such row exists. Any other failure is an
    /// error; retry policy, if any, belongs to the implementation.
    async fn fetch_by_id(&self, id: R::Id, ctx: &RequestContext) -> Result<Option<R>, StoreError>;

    /// Cheap connectivity probe used by readiness checks.
    async fn health_check(&self, _ctx: &RequestContext) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Volatile key-value cache with per-entry expiry.
///
/// Implementations must be safe for concurrent use. A write for an existing
/// key overwrites it and restarts its TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the raw bytes stored under `key`; `Ok(None)` on a miss or expiry.
    async fn get(&self, key: &CacheKey, ctx: &RequestContext) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, expiring `ttl` after the write.
    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        ctx: &RequestContext,
    ) -> Result<(), CacheError>;

    /// Cheap connectivity probe used by readiness checks.
    async fn health_check(&self, _ctx: &RequestContext) -> Result<(), CacheError> {
        Ok(())
    }

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate bytes held by stored values.
    pub memory_bytes: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
