//! Lookaside Storage - Resolver and Storage Traits
//!
//! Defines the collaborator contracts (a durable [`RecordStore`] and a
//! volatile [`CacheStore`]) and the [`Resolver`] that composes them into a
//! cache-aside lookup. Network-backed adapters live in lookaside-api.

pub mod cache;
pub mod codec;
pub mod memory_store;

pub use cache::{
    CacheFault, CacheKey, CacheStats, CacheStore, CacheableRecord, InMemoryCache, Lookup,
    LookupSource, RecordStore, Resolver, ResolverConfig, DEFAULT_TTL, MAX_TTL,
};
pub use memory_store::InMemoryStore;
