//! In-process cache backend with per-entry TTL.
//!
//! Used when no Redis is configured and as the reference backend in tests.
//! Expiry is lazy: an expired entry is dropped by the first probe at or
//! after its deadline, or by [`InMemoryCache::purge_expired`].
//!
//! Time is read from `tokio::time::Instant`, so tests can drive expiry with
//! a paused clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lookaside_core::{CacheError, RequestContext};
use tokio::time::Instant;

use super::traits::{CacheKey, CacheStats, CacheStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe in-memory cache.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired-but-unpurged ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists for `key`. Does not touch statistics.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.get(key).is_some_and(|e| !e.is_expired(now)))
            .unwrap_or(false)
    }

    /// Time left before `key` expires, if it is live.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.expires_at.saturating_duration_since(now))
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        Ok(removed)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Snapshot of usage statistics.
    pub fn stats(&self) -> CacheStats {
        let (entry_count, memory_bytes) = self
            .entries
            .read()
            .map(|entries| {
                let bytes: usize = entries.iter().map(|(k, e)| k.len() + e.value.len()).sum();
                (entries.len() as u64, bytes as u64)
            })
            .unwrap_or((0, 0));

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            memory_bytes,
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &CacheKey, _ctx: &RequestContext) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
            match entries.get(key.as_str()) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
                None => {
                    self.record_miss();
                    return Ok(None);
                }
                Some(_) => {}
            }
        }

        // Expired: drop it unless a concurrent write already replaced it.
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        if entries
            .get(key.as_str())
            .is_some_and(|e| e.is_expired(now))
        {
            entries.remove(key.as_str());
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.record_miss();
        Ok(None)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        _ctx: &RequestContext,
    ) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::CommandFailed {
                command: "SET".to_string(),
                reason: format!("ttl {:?} overflows the clock", ttl),
            })?;
        let entry = Entry { value, expires_at };
        self.entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .insert(key.as_str().to_string(), entry);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
