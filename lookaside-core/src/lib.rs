//! Lookaside Core - Record Types
//!
//! Data types shared by every lookaside crate: the records served by the
//! resolver, the error taxonomy, and the per-request cancellation context.
//! No I/O lives here.

pub mod entities;
pub mod error;
pub mod request;

pub use entities::{User, UserId};
pub use error::{CacheError, CodecError, ConfigError, ResolveError, ResolveResult, StoreError};
pub use request::{Interrupted, RequestContext};
