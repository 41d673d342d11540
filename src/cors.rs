//! CORS front filter
//!
//! Runs before the request pipeline: preflight (`OPTIONS` with an `Origin`)
//! is answered directly, and actual responses passing through the gateway
//! are decorated with the credentialed CORS headers. The method and header
//! lists are fixed; origins and max-age come from configuration.

use crate::config::CorsConfig;

/// Methods the gateway accepts cross-origin
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";

/// Request headers browsers may send cross-origin
pub const ALLOWED_HEADERS: &str = "Authorization, Content-Type, X-XSRF-TOKEN, \
X-User-Id, X-User-Role, X-User-Plan, Accept, Origin, X-Requested-With";

/// Response headers exposed to cross-origin callers
pub const EXPOSED_HEADERS: &str = "X-User-Id, X-User-Role, X-User-Plan";

pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    max_age_secs: u64,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            max_age_secs: config.max_age_secs,
        }
    }

    /// True when the origin is covered by the configured patterns
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }

    /// Headers for a preflight response.
    ///
    /// Credentials are allowed, so the origin is echoed back rather than
    /// answered with a wildcard.
    pub fn preflight_headers(&self, origin: &str) -> Vec<(&'static str, String)> {
        vec![
            ("Access-Control-Allow-Origin", origin.to_string()),
            ("Access-Control-Allow-Methods", ALLOWED_METHODS.to_string()),
            ("Access-Control-Allow-Headers", ALLOWED_HEADERS.to_string()),
            ("Access-Control-Allow-Credentials", "true".to_string()),
            ("Access-Control-Max-Age", self.max_age_secs.to_string()),
            ("Vary", "Origin".to_string()),
        ]
    }

    /// Headers added to actual (non-preflight) responses
    pub fn response_headers(&self, origin: &str) -> Vec<(&'static str, String)> {
        vec![
            ("Access-Control-Allow-Origin", origin.to_string()),
            ("Access-Control-Allow-Credentials", "true".to_string()),
            ("Access-Control-Expose-Headers", EXPOSED_HEADERS.to_string()),
            ("Vary", "Origin".to_string()),
        ]
    }
}
