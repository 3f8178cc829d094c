//! Error types for lookaside operations

use thiserror::Error;

use crate::request::Interrupted;

/// Failures reported by the authoritative record store.
///
/// "No such row" is not an error: stores report it as `Ok(None)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Malformed row for id {id}: {reason}")]
    MalformedRow { id: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Failures reported by the cache store.
///
/// These never cross the resolver boundary; a miss is `Ok(None)`, not an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Failures encoding a record for the cache or decoding a cached entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encode failed: {reason}")]
    Encode { reason: String },

    #[error("Decode failed: {reason}")]
    Decode { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors a resolve call can surface to its caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Lookup cancelled by caller")]
    Cancelled,

    #[error("Lookup deadline exceeded")]
    DeadlineExceeded,
}

impl From<Interrupted> for ResolveError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => ResolveError::Cancelled,
            Interrupted::DeadlineExceeded => ResolveError::DeadlineExceeded,
        }
    }
}

impl ResolveError {
    /// True for caller-imposed limits rather than store health.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Result type alias for resolve operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
