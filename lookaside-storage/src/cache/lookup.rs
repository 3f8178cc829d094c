//! Lookup results carrying provenance metadata.
//!
//! A [`Lookup`] says where a record came from and which cache faults were
//! absorbed on the way. Faults are informational: a lookup with faults is
//! still a correct answer, it just took the slow path.

use chrono::{DateTime, Utc};
use lookaside_core::{CacheError, CodecError, Interrupted};

/// Where the returned record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupSource {
    /// Decoded from a live cache entry; the store was not consulted.
    Cache,
    /// Read from the authoritative store after a miss.
    Store,
}

impl LookupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Store => "store",
        }
    }
}

/// A cache fault the resolver recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheFault {
    /// The cache probe failed; treated as a miss.
    GetFailed(CacheError),
    /// The cached bytes did not decode; treated as a miss.
    Corrupt(CodecError),
    /// The cached entry decoded to a record with a different id; treated as a miss.
    KeyMismatch { expected: String, found: String },
    /// The fetched record could not be encoded; write-back skipped.
    EncodeFailed(CodecError),
    /// The write-back was rejected by the cache.
    SetFailed(CacheError),
    /// The caller was interrupted during the write-back; write dropped.
    WriteInterrupted(Interrupted),
}

impl CacheFault {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetFailed(_) => "get_failed",
            Self::Corrupt(_) => "corrupt",
            Self::KeyMismatch { .. } => "key_mismatch",
            Self::EncodeFailed(_) => "encode_failed",
            Self::SetFailed(_) => "set_failed",
            Self::WriteInterrupted(_) => "write_interrupted",
        }
    }

    /// True for faults raised before the store fallback.
    pub fn is_read_side(&self) -> bool {
        matches!(
            self,
            Self::GetFailed(_) | Self::Corrupt(_) | Self::KeyMismatch { .. }
        )
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct Lookup<T> {
    value: T,
    source: LookupSource,
    read_at: DateTime<Utc>,
    faults: Vec<CacheFault>,
}

impl<T> Lookup<T> {
    /// A lookup served from a cache hit.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            source: LookupSource::Cache,
            read_at: Utc::now(),
            faults: Vec::new(),
        }
    }

    /// A lookup served by the store, with any faults absorbed along the way.
    pub fn from_store(value: T, faults: Vec<CacheFault>) -> Self {
        Self {
            value,
            source: LookupSource::Store,
            read_at: Utc::now(),
            faults,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> LookupSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == LookupSource::Cache
    }

    pub fn was_cache_miss(&self) -> bool {
        self.source == LookupSource::Store
    }

    /// When the value was read, from whichever source.
    pub fn read_at(&self) -> DateTime<Utc> {
        self.read_at
    }

    pub fn faults(&self) -> &[CacheFault] {
        &self.faults
    }

    /// True if any cache fault was absorbed.
    pub fn is_degraded(&self) -> bool {
        !self.faults.is_empty()
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> Lookup<U>
    where
        F: FnOnce(T) -> U,
    {
        Lookup {
            value: f(self.value),
            source: self.source,
            read_at: self.read_at,
            faults: self.faults,
        }
    }
}

impl<T> AsRef<T> for Lookup<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_from_cache() {
        let read = Lookup::from_cache("value");
        assert!(read.was_cache_hit());
        assert!(!read.was_cache_miss());
        assert!(!read.is_degraded());
        assert_eq!(read.source().as_str(), "cache");
    }

    #[test]
    fn test_lookup_from_store_with_faults() {
        let fault = CacheFault::GetFailed(CacheError::Unavailable {
            reason: "refused".to_string(),
        });
        let read = Lookup::from_store(42i32, vec![fault.clone()]);

        assert!(read.was_cache_miss());
        assert!(read.is_degraded());
        assert_eq!(read.faults(), &[fault]);
        assert_eq!(read.into_value(), 42);
    }

    #[test]
    fn test_lookup_map_keeps_metadata() {
        let read = Lookup::from_store(7i32, Vec::new());
        let read_at = read.read_at();
        let mapped = read.map(|v| v.to_string());

        assert_eq!(mapped.read_at(), read_at);
        assert_eq!(mapped.source(), LookupSource::Store);
        assert_eq!(mapped.into_value(), "7");
    }

    #[test]
    fn test_fault_kinds() {
        let decode = CodecError::Decode {
            reason: "eof".to_string(),
        };
        assert_eq!(CacheFault::Corrupt(decode.clone()).kind(), "corrupt");
        assert!(CacheFault::Corrupt(decode.clone()).is_read_side());
        assert!(!CacheFault::EncodeFailed(decode).is_read_side());
        assert_eq!(
            CacheFault::WriteInterrupted(Interrupted::DeadlineExceeded).kind(),
            "write_interrupted"
        );
    }
}
