//! Cache-aside lookup over an authoritative store.
//!
//! The cache is strictly an accelerator. Every cache fault (unreachable
//! backend, corrupt entry, failed write-back) degrades to a direct store
//! read and is reported on the returned [`Lookup`], never as an error. Only
//! store failures and caller interruption cross the [`Resolver`] boundary.
//!
//! # Example
//!
//! ```ignore
//! let resolver = Resolver::new(store, cache, ResolverConfig::default());
//!
//! let ctx = RequestContext::with_timeout(Duration::from_secs(5));
//! match resolver.lookup(UserId::new(1), &ctx).await? {
//!     Some(read) if read.was_cache_hit() => tracing::debug!("served from cache"),
//!     Some(read) => tracing::debug!(faults = read.faults().len(), "served from store"),
//!     None => tracing::debug!("no such user"),
//! }
//! ```

pub mod lookup;
pub mod memory;
pub mod read_through;
pub mod traits;

pub use lookup::{CacheFault, Lookup, LookupSource};
pub use memory::InMemoryCache;
pub use read_through::{Resolver, ResolverConfig, DEFAULT_TTL, MAX_TTL};
pub use traits::{CacheKey, CacheStats, CacheStore, CacheableRecord, RecordStore};
