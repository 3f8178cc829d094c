//! In-memory record store for tests and local runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use lookaside_core::{RequestContext, StoreError};

use crate::cache::{CacheableRecord, RecordStore};

/// Authoritative store held in a `HashMap`.
///
/// Mutations take effect immediately, which makes it useful for observing
/// the staleness window: update a record here and the resolver keeps
/// serving the cached copy until its TTL elapses.
pub struct InMemoryStore<R: CacheableRecord> {
    records: RwLock<HashMap<R::Id, R>>,
}

impl<R: CacheableRecord> InMemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store seeded with `records`, keyed by their own ids.
    pub fn with_records(records: impl IntoIterator<Item = R>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.record_id(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Insert or replace a record, returning the previous version.
    pub fn insert(&self, record: R) -> Result<Option<R>, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.insert(record.record_id(), record))
    }

    /// Remove a record, returning it if it existed.
    pub fn remove(&self, id: R::Id) -> Result<Option<R>, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.remove(&id))
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

impl<R: CacheableRecord> Default for InMemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CacheableRecord> fmt::Debug for InMemoryStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entity", &R::entity_name())
            .field("len", &self.len())
            .finish()
    }
}

#[async_trait]
impl<R: CacheableRecord> RecordStore<R> for InMemoryStore<R> {
    async fn fetch_by_id(&self, id: R::Id, _ctx: &RequestContext) -> Result<Option<R>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(&id).cloned())
    }
}
