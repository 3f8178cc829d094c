//! Lookaside Test Utilities
//!
//! Centralized test infrastructure for the lookaside workspace:
//! - Fault-injecting store and cache doubles
//! - Proptest generators for records and ids
//! - Test fixtures for common scenarios
//! - Custom assertions for resolver outcomes

pub use lookaside_core::{
    CacheError, Interrupted, RequestContext, ResolveError, ResolveResult, StoreError, User, UserId,
};
pub use lookaside_storage::{
    CacheKey, CacheStore, CacheableRecord, InMemoryCache, InMemoryStore, Lookup, RecordStore,
    Resolver, ResolverConfig,
};

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// STORE DOUBLES
// ============================================================================

/// Store wrapper that counts fetches reaching the inner store.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    fetches: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of `fetch_by_id` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R, S> RecordStore<R> for CountingStore<S>
where
    R: CacheableRecord,
    S: RecordStore<R>,
{
    async fn fetch_by_id(&self, id: R::Id, ctx: &RequestContext) -> Result<Option<R>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_by_id(id, ctx).await
    }

    async fn health_check(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        self.inner.health_check(ctx).await
    }
}

/// Store whose every call fails with a fixed error.
#[derive(Debug, Clone)]
pub struct FailingStore {
    error: StoreError,
}

impl FailingStore {
    pub fn new(error: StoreError) -> Self {
        Self { error }
    }

    /// A store that reports its backend as unreachable.
    pub fn unavailable() -> Self {
        Self::new(StoreError::Unavailable {
            reason: "connection refused".to_string(),
        })
    }
}

#[async_trait]
impl<R: CacheableRecord> RecordStore<R> for FailingStore {
    async fn fetch_by_id(&self, _id: R::Id, _ctx: &RequestContext) -> Result<Option<R>, StoreError> {
        Err(self.error.clone())
    }

    async fn health_check(&self, _ctx: &RequestContext) -> Result<(), StoreError> {
        Err(self.error.clone())
    }
}

/// Store wrapper that sleeps before every fetch.
///
/// Sleeps on the tokio clock, so tests with a paused runtime can step
/// through the delay deterministically.
#[derive(Debug)]
pub struct SlowStore<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowStore<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<R, S> RecordStore<R> for SlowStore<S>
where
    R: CacheableRecord,
    S: RecordStore<R>,
{
    async fn fetch_by_id(&self, id: R::Id, ctx: &RequestContext) -> Result<Option<R>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_by_id(id, ctx).await
    }
}

// ============================================================================
// CACHE DOUBLES
// ============================================================================

/// Cache that fails selected operations and delegates the rest to an
/// [`InMemoryCache`].
#[derive(Debug, Default)]
pub struct FailingCache {
    inner: InMemoryCache,
    fail_get: bool,
    fail_set: bool,
}

impl FailingCache {
    /// Every operation fails, as with an unreachable backend.
    pub fn down() -> Self {
        Self {
            inner: InMemoryCache::new(),
            fail_get: true,
            fail_set: true,
        }
    }

    /// Reads fail; writes land in the inner cache.
    pub fn failing_gets() -> Self {
        Self {
            inner: InMemoryCache::new(),
            fail_get: true,
            fail_set: false,
        }
    }

    /// Writes fail; reads are served by the inner cache.
    pub fn failing_sets() -> Self {
        Self {
            inner: InMemoryCache::new(),
            fail_get: false,
            fail_set: true,
        }
    }

    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }
}

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, key: &CacheKey, ctx: &RequestContext) -> Result<Option<Vec<u8>>, CacheError> {
        if self.fail_get {
            return Err(CacheError::CommandFailed {
                command: "GET".to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.get(key, ctx).await
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        ctx: &RequestContext,
    ) -> Result<(), CacheError> {
        if self.fail_set {
            return Err(CacheError::CommandFailed {
                command: "SET".to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.set(key, value, ttl, ctx).await
    }

    async fn health_check(&self, _ctx: &RequestContext) -> Result<(), CacheError> {
        if self.fail_get && self.fail_set {
            return Err(CacheError::Unavailable {
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Cache that records every write it accepts.
#[derive(Debug, Default)]
pub struct RecordingCache {
    inner: InMemoryCache,
    writes: Mutex<Vec<(String, Duration)>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }

    /// `(key, ttl)` of every accepted write, in order.
    pub fn writes(&self) -> Vec<(String, Duration)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn get(&self, key: &CacheKey, ctx: &RequestContext) -> Result<Option<Vec<u8>>, CacheError> {
        self.inner.get(key, ctx).await
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        ctx: &RequestContext,
    ) -> Result<(), CacheError> {
        self.writes
            .lock()
            .map_err(|_| CacheError::LockPoisoned)?
            .push((key.as_str().to_string(), ttl));
        self.inner.set(key, value, ttl, ctx).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Cache wrapper that sleeps on the tokio clock before reads and writes.
#[derive(Debug, Default)]
pub struct SlowCache {
    inner: InMemoryCache,
    get_delay: Duration,
    set_delay: Duration,
}

impl SlowCache {
    pub fn new(get_delay: Duration, set_delay: Duration) -> Self {
        Self {
            inner: InMemoryCache::new(),
            get_delay,
            set_delay,
        }
    }

    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }
}

#[async_trait]
impl CacheStore for SlowCache {
    async fn get(&self, key: &CacheKey, ctx: &RequestContext) -> Result<Option<Vec<u8>>, CacheError> {
        tokio::time::sleep(self.get_delay).await;
        self.inner.get(key, ctx).await
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
        ctx: &RequestContext,
    ) -> Result<(), CacheError> {
        tokio::time::sleep(self.set_delay).await;
        self.inner.set(key, value, ttl, ctx).await
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}

// ============================================================================
// RUNTIME HELPERS
// ============================================================================

/// Run `fut` to completion on a fresh current-thread runtime with a paused
/// clock. Used from inside `proptest!` bodies, which are synchronous.
pub fn block_on_paused<F: Future>(fut: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build test runtime");
    runtime.block_on(fut)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating lookaside records.

    use super::*;
    use proptest::prelude::*;

    /// Generate a valid (positive) user id.
    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        (1i64..=i64::MAX).prop_map(UserId::new)
    }

    /// Generate a display name, including quotes and non-ASCII text.
    pub fn arb_name() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z][A-Za-z '-]{0,30}",
            "\\PC{0,24}",
            Just(String::new()),
        ]
    }

    /// Generate an age, edge values included.
    pub fn arb_age() -> impl Strategy<Value = i32> {
        prop_oneof![0i32..=130, Just(i32::MAX), Just(i32::MIN)]
    }

    /// Generate a user with a valid id.
    pub fn arb_user() -> impl Strategy<Value = User> {
        (arb_user_id(), arb_name(), arb_age()).prop_map(|(id, name, age)| User::new(id, name, age))
    }

    /// Generate up to `max` users with distinct ids.
    pub fn arb_users(max: usize) -> impl Strategy<Value = Vec<User>> {
        prop::collection::hash_map(arb_user_id(), (arb_name(), arb_age()), 0..=max).prop_map(
            |rows| {
                rows.into_iter()
                    .map(|(id, (name, age))| User::new(id, name, age))
                    .collect()
            },
        )
    }

    /// Generate a whole-millisecond TTL between 1ms and 60s.
    pub fn arb_ttl() -> impl Strategy<Value = Duration> {
        (1u64..=60_000).prop_map(Duration::from_millis)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Resolver over the in-memory collaborators.
    pub type MemoryResolver = Resolver<User, InMemoryStore<User>, InMemoryCache>;

    /// The canonical example row: id 1, "Alice", age 30.
    pub fn alice() -> User {
        User::new(1, "Alice", 30)
    }

    pub fn bob() -> User {
        User::new(2, "Bob", 25)
    }

    /// Store seeded with [`alice`] and [`bob`].
    pub fn seeded_store() -> InMemoryStore<User> {
        InMemoryStore::with_records([alice(), bob()])
    }

    /// Seeded store, empty cache and a resolver with the default TTL.
    pub fn memory_resolver() -> (Arc<InMemoryStore<User>>, Arc<InMemoryCache>, MemoryResolver) {
        let store = Arc::new(seeded_store());
        let cache = Arc::new(InMemoryCache::new());
        let resolver = Resolver::with_defaults(Arc::clone(&store), Arc::clone(&cache));
        (store, cache, resolver)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for resolver outcomes.

    use super::*;
    use std::fmt::Debug;

    /// Assert that a lookup was served from the cache.
    #[track_caller]
    pub fn assert_cache_hit<T: Debug>(lookup: &Lookup<T>) {
        assert!(lookup.was_cache_hit(), "Expected cache hit, got: {:?}", lookup);
    }

    /// Assert that a lookup was served by the store.
    #[track_caller]
    pub fn assert_cache_miss<T: Debug>(lookup: &Lookup<T>) {
        assert!(lookup.was_cache_miss(), "Expected cache miss, got: {:?}", lookup);
    }

    /// Assert that a ResolveResult is a store error.
    #[track_caller]
    pub fn assert_store_error<T: Debug>(result: &ResolveResult<T>) {
        match result {
            Err(ResolveError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }

    /// Assert that a ResolveResult failed with the given interruption.
    #[track_caller]
    pub fn assert_interrupted<T: Debug>(result: &ResolveResult<T>, expected: Interrupted) {
        let want = ResolveError::from(expected);
        match result {
            Err(err) if *err == want => {}
            other => panic!("Expected {:?}, got: {:?}", want, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
