//! Per-project configuration types.
//!
//! A project is a configured logical upstream service, identified by a URL
//! path prefix. The prefix doubles as the circuit breaker name. All values
//! are immutable after load.
//!
//! Default values for resilience settings are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::constants::{
    DEFAULT_FAILURE_RATE_THRESHOLD, DEFAULT_HALF_OPEN_PERMITTED_CALLS, DEFAULT_SESSION_COOKIE,
    DEFAULT_SLIDING_WINDOW_SIZE, DEFAULT_TIME_LIMITER_TIMEOUT_MS, DEFAULT_WAIT_DURATION_MS,
};

fn default_session_cookie() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

fn default_failure_rate_threshold() -> f32 {
    DEFAULT_FAILURE_RATE_THRESHOLD
}

fn default_sliding_window_size() -> usize {
    DEFAULT_SLIDING_WINDOW_SIZE
}

fn default_wait_duration_ms() -> u64 {
    DEFAULT_WAIT_DURATION_MS
}

fn default_half_open_permitted_calls() -> u32 {
    DEFAULT_HALF_OPEN_PERMITTED_CALLS
}

fn default_time_limiter_timeout_ms() -> u64 {
    DEFAULT_TIME_LIMITER_TIMEOUT_MS
}

fn default_cancel_running_future() -> bool {
    true
}

/// How a project authenticates its callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthType {
    /// Signed bearer token (HMAC or RSA public key)
    Token,
    /// Server-held session looked up in the store
    Session,
}

/// Token bucket parameters (tokens per second)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfigYaml {
    /// Maximum bucket capacity; also the initial fill
    pub capacity: u64,
    /// Tokens added per second; zero means the bucket never refills
    pub refill_rate: u64,
}

/// Circuit breaker parameters (YAML format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfigYaml {
    /// Failure rate (percent of the sliding window) that opens the circuit
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f32,
    /// Number of terminal outcomes in the count-based sliding window
    #[serde(default = "default_sliding_window_size")]
    pub sliding_window_size: usize,
    /// How long to stay open before probing again (milliseconds)
    #[serde(default = "default_wait_duration_ms")]
    pub wait_duration_ms: u64,
    /// Concurrent trial calls permitted in the half-open state
    #[serde(default = "default_half_open_permitted_calls")]
    pub permitted_calls_in_half_open: u32,
}

impl CircuitBreakerConfigYaml {
    /// Convert to the runtime breaker configuration
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_size: self.sliding_window_size,
            wait_duration: std::time::Duration::from_millis(self.wait_duration_ms),
            half_open_permitted_calls: self.permitted_calls_in_half_open,
        }
    }
}

/// Upstream response deadline, separate from the TCP connect timeout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLimiterConfigYaml {
    /// Wall-clock deadline for the upstream call (milliseconds)
    #[serde(default = "default_time_limiter_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether the in-flight upstream call is torn down when the deadline
    /// fires. The connection is always closed on timeout; the flag is kept
    /// for configuration surface compatibility.
    #[serde(default = "default_cancel_running_future")]
    pub cancel_running_future: bool,
}

/// One configured upstream project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// URL path prefix, unique across projects; also the breaker name
    pub prefix: String,
    /// Absolute upstream base URL
    pub target_url: String,
    /// Authentication mode
    pub auth_type: AuthType,
    /// Base64-encoded symmetric HMAC secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    /// Base64-encoded X.509 RSA public key; wins over the secret when both
    /// are present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_public_key: Option<String>,
    /// Cookie to read the token from when the Authorization header is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_cookie_name: Option<String>,
    /// Cookie holding the session id
    #[serde(default = "default_session_cookie")]
    pub session_cookie_name: String,
    /// Enforce X-XSRF-TOKEN on write methods
    #[serde(default)]
    pub csrf_required: bool,
    /// Ant-style glob patterns exempting paths from authentication
    #[serde(default)]
    pub public_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfigYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfigYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limiter: Option<TimeLimiterConfigYaml>,
}

impl ProjectConfig {
    /// Validate one project's settings
    pub fn validate(&self, project_name: &str) -> Result<(), String> {
        if self.prefix.is_empty() || !self.prefix.starts_with('/') {
            return Err(format!(
                "Project '{}': prefix must be a non-empty path starting with '/'",
                project_name
            ));
        }

        if !self.target_url.starts_with("http://") && !self.target_url.starts_with("https://") {
            return Err(format!(
                "Project '{}': target_url must be an absolute http(s) URL",
                project_name
            ));
        }

        if let Some(limit) = &self.rate_limit {
            if limit.capacity < 1 {
                return Err(format!(
                    "Project '{}': rate_limit.capacity must be at least 1",
                    project_name
                ));
            }
        }

        if let Some(breaker) = &self.circuit_breaker {
            if !(0.0..=100.0).contains(&breaker.failure_rate_threshold) {
                return Err(format!(
                    "Project '{}': circuit_breaker.failure_rate_threshold must be in [0, 100]",
                    project_name
                ));
            }
            if breaker.sliding_window_size < 1 {
                return Err(format!(
                    "Project '{}': circuit_breaker.sliding_window_size must be at least 1",
                    project_name
                ));
            }
            if breaker.permitted_calls_in_half_open < 1 {
                return Err(format!(
                    "Project '{}': circuit_breaker.permitted_calls_in_half_open must be at least 1",
                    project_name
                ));
            }
        }

        Ok(())
    }
}
