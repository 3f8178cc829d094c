//! Read-through resolver.
//!
//! Implements the cache-aside lookup: probe the cache, fall back to the
//! store on a miss, write the fetched record back with a bounded TTL.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use lookaside_core::{ConfigError, RequestContext, ResolveResult};
use tracing::Instrument;

use super::lookup::{CacheFault, Lookup};
use super::traits::{CacheKey, CacheStore, CacheableRecord, RecordStore};
use crate::codec;

/// Default staleness bound for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Longest TTL a resolver accepts. Well inside what Redis `PX` and the
/// monotonic clock can represent.
pub const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Configuration for the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Lifetime of an entry written back after a store read. This is the
    /// maximum staleness a caller can observe.
    pub ttl: Duration,
    /// Namespace prepended to the record id to form the cache key.
    pub key_prefix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            key_prefix: String::new(),
        }
    }
}

impl ResolverConfig {
    /// Create a new resolver config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the cache key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Reject settings no cache backend can honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}", self.ttl),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.ttl.subsec_nanos() % 1_000_000 != 0 {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}", self.ttl),
                reason: "must be a whole number of milliseconds".to_string(),
            });
        }
        if self.ttl > MAX_TTL {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}", self.ttl),
                reason: format!("must not exceed {}s", MAX_TTL.as_secs()),
            });
        }
        Ok(())
    }

    /// Cache key for a record id.
    pub fn key_for(&self, id: impl std::fmt::Display) -> CacheKey {
        CacheKey::for_id(&self.key_prefix, id)
    }
}

/// Cache-aside resolver over an injected store and cache.
///
/// Stateless between calls: it holds shared handles to its collaborators
/// and an immutable config, so one instance serves any number of
/// concurrent lookups. Concurrent misses on the same key each read the
/// store and each write the cache; the last write wins.
///
/// # Type Parameters
///
/// - `R`: The record type served
/// - `S`: The authoritative store
/// - `C`: The cache backend
pub struct Resolver<R, S, C>
where
    R: CacheableRecord,
    S: RecordStore<R> + ?Sized,
    C: CacheStore + ?Sized,
{
    store: Arc<S>,
    cache: Arc<C>,
    config: ResolverConfig,
    _record: PhantomData<fn() -> R>,
}

impl<R, S, C> Resolver<R, S, C>
where
    R: CacheableRecord,
    S: RecordStore<R> + ?Sized,
    C: CacheStore + ?Sized,
{
    /// Create a new resolver.
    pub fn new(store: Arc<S>, cache: Arc<C>, config: ResolverConfig) -> Self {
        Self {
            store,
            cache,
            config,
            _record: PhantomData,
        }
    }

    /// Create a new resolver with the default 10 second TTL.
    pub fn with_defaults(store: Arc<S>, cache: Arc<C>) -> Self {
        Self::new(store, cache, ResolverConfig::default())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Resolve a record by id.
    ///
    /// Returns `Ok(None)` when the store has no such record. Errors are
    /// limited to store failures and caller interruption.
    pub async fn resolve(&self, id: R::Id, ctx: &RequestContext) -> ResolveResult<Option<R>> {
        Ok(self.lookup(id, ctx).await?.map(Lookup::into_value))
    }

    /// Resolve a record by id, keeping provenance and absorbed cache faults.
    pub async fn lookup(
        &self,
        id: R::Id,
        ctx: &RequestContext,
    ) -> ResolveResult<Option<Lookup<R>>> {
        let span = tracing::debug_span!(
            "lookup",
            entity = R::entity_name(),
            id = %id,
            cache = self.cache.backend_name(),
        );
        self.lookup_inner(id, ctx).instrument(span).await
    }

    async fn lookup_inner(
        &self,
        id: R::Id,
        ctx: &RequestContext,
    ) -> ResolveResult<Option<Lookup<R>>> {
        let key = self.config.key_for(id);
        let mut faults = Vec::new();

        // Step 1: cache probe. Any cache-side failure is a miss.
        match ctx.run(self.cache.get(&key, ctx)).await? {
            Ok(Some(bytes)) => match codec::decode::<R>(&bytes) {
                Ok(record) if record.record_id() == id => {
                    tracing::debug!(%key, "cache hit");
                    return Ok(Some(Lookup::from_cache(record)));
                }
                Ok(record) => {
                    let found = record.record_id().to_string();
                    tracing::warn!(%key, expected = %id, %found, "cached entry holds a different record, ignoring");
                    faults.push(CacheFault::KeyMismatch {
                        expected: id.to_string(),
                        found,
                    });
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "corrupt cache entry, treating as miss");
                    faults.push(CacheFault::Corrupt(e));
                }
            },
            Ok(None) => {
                tracing::debug!(%key, "cache miss");
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache get failed, falling back to store");
                faults.push(CacheFault::GetFailed(e));
            }
        }

        // Step 2: store fallback.
        let record = match ctx.run(self.store.fetch_by_id(id, ctx)).await? {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("not found in store");
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(error = %e, "store fetch failed");
                return Err(e.into());
            }
        };

        // Step 3: write-back. Failures degrade, never fail the lookup.
        if let Some(fault) = self.write_back(&key, &record, ctx).await {
            faults.push(fault);
        }

        Ok(Some(Lookup::from_store(record, faults)))
    }

    /// Encode and store `record` under `key`. Returns the fault, if any,
    /// for the caller to record and discard.
    async fn write_back(&self, key: &CacheKey, record: &R, ctx: &RequestContext) -> Option<CacheFault> {
        let bytes = match codec::encode(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%key, error = %e, "encode failed, skipping write-back");
                return Some(CacheFault::EncodeFailed(e));
            }
        };

        match ctx.run(self.cache.set(key, bytes, self.config.ttl, ctx)).await {
            Ok(Ok(())) => {
                tracing::debug!(%key, ttl_ms = self.config.ttl.as_millis() as u64, "cache populated");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(%key, error = %e, "cache set failed");
                Some(CacheFault::SetFailed(e))
            }
            Err(interrupted) => {
                tracing::warn!(%key, reason = %interrupted, "write-back dropped");
                Some(CacheFault::WriteInterrupted(interrupted))
            }
        }
    }
}

impl<R, S, C> Clone for Resolver<R, S, C>
where
    R: CacheableRecord,
    S: RecordStore<R> + ?Sized,
    C: CacheStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
            _record: PhantomData,
        }
    }
}
