// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

// =============================================================================
// Gateway defaults
// =============================================================================

/// Default global timeout in milliseconds
pub const DEFAULT_GLOBAL_TIMEOUT_MS: u64 = 30_000;

/// TCP connect timeout to upstreams in milliseconds (fixed)
pub const UPSTREAM_CONNECT_TIMEOUT_MS: u64 = 3_000;

// =============================================================================
// Circuit breaker defaults
// =============================================================================

/// Default failure rate threshold (percent) to open the circuit
pub const DEFAULT_FAILURE_RATE_THRESHOLD: f32 = 50.0;

/// Default count-based sliding window size
pub const DEFAULT_SLIDING_WINDOW_SIZE: usize = 10;

/// Default wait duration in the open state in milliseconds
pub const DEFAULT_WAIT_DURATION_MS: u64 = 10_000;

/// Default number of trial calls permitted in the half-open state
pub const DEFAULT_HALF_OPEN_PERMITTED_CALLS: u32 = 3;

// =============================================================================
// Time limiter defaults
// =============================================================================

/// Default upstream response timeout in milliseconds
pub const DEFAULT_TIME_LIMITER_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// Authentication defaults
// =============================================================================

/// Default session cookie name
pub const DEFAULT_SESSION_COOKIE: &str = "SESSION";

/// Key prefix for server-held sessions in the store
pub const SESSION_KEY_PREFIX: &str = "spring:session:sessions:";

/// CSRF token header checked on write requests
pub const CSRF_HEADER: &str = "x-xsrf-token";

// =============================================================================
// Rate limiter defaults
// =============================================================================

/// Key prefix for token bucket state in the store
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit";

// =============================================================================
// Identity propagation headers
// =============================================================================

/// Header carrying the authenticated user id to the upstream
pub const X_USER_ID: &str = "X-User-Id";

/// Header carrying the authenticated user role to the upstream
pub const X_USER_ROLE: &str = "X-User-Role";

/// Header carrying the authenticated user plan to the upstream
pub const X_USER_PLAN: &str = "X-User-Plan";

// =============================================================================
// CORS defaults
// =============================================================================

/// Default preflight max-age in seconds
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 3_600;
