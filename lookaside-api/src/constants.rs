//! Constants for the Lookaside API
//!
//! Default values and header names used throughout the API.

// ============================================================================
// SERVER
// ============================================================================

/// Default interface to bind
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default per-lookup deadline in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Deadline for readiness probes against each collaborator
pub const HEALTH_CHECK_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// CACHE
// ============================================================================

/// Default cache entry lifetime in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 10;

/// Sweep interval for expired entries in the in-memory backend
pub const MEMORY_CACHE_PURGE_INTERVAL_SECS: u64 = 30;

/// Response header reporting whether a lookup was a cache hit
pub const X_CACHE_HEADER: &str = "x-cache";

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// SERVER URLs
// ============================================================================

/// Development server URL
pub const DEV_SERVER_URL: &str = "http://localhost:8080";
