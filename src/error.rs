// Error types module

use std::fmt;

use serde::Serialize;

/// Centralized error type for the gateway
///
/// Every terminal outcome of the request pipeline maps to exactly one of
/// these variants, and every variant maps to exactly one HTTP status code.
/// The user-visible JSON body is produced by [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// No configured project matched the request path (404)
    Routing { path: String },

    /// Write request on a CSRF-protected project without an X-XSRF-TOKEN (403)
    CsrfMissing { path: String },

    /// Authentication produced no identity and no public path matched (401)
    AuthMissing { path: String },

    /// Token bucket for the request fingerprint is empty (429)
    RateLimited { key: String },

    /// Circuit breaker for the project is open (503)
    BreakerOpen { prefix: String },

    /// Upstream did not produce a response within the configured deadline (504)
    UpstreamTimeout { prefix: String },

    /// Upstream connection could not be established (502)
    UpstreamUnreachable { prefix: String },

    /// Upstream answered with a server error (502)
    ///
    /// Used for breaker classification; passthrough responses keep the
    /// upstream status.
    UpstreamServerError { prefix: String, status: u16 },

    /// Project configuration is unusable at request time (500)
    ConfigInvalid { message: String },

    /// Anything else (500)
    Internal { message: String },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Routing { path } => {
                write!(f, "No project matched for path: {}", path)
            }
            GatewayError::CsrfMissing { path } => {
                write!(f, "Missing CSRF token for write request: {}", path)
            }
            GatewayError::AuthMissing { path } => {
                write!(f, "Authentication required for path: {}", path)
            }
            GatewayError::RateLimited { key } => {
                write!(f, "Rate limit exceeded for key: {}", key)
            }
            GatewayError::BreakerOpen { prefix } => {
                write!(f, "Circuit breaker open for project: {}", prefix)
            }
            GatewayError::UpstreamTimeout { prefix } => {
                write!(f, "Upstream timed out for project: {}", prefix)
            }
            GatewayError::UpstreamUnreachable { prefix } => {
                write!(f, "Upstream unreachable for project: {}", prefix)
            }
            GatewayError::UpstreamServerError { prefix, status } => {
                write!(f, "Upstream error {} for project: {}", status, prefix)
            }
            GatewayError::ConfigInvalid { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            GatewayError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for GatewayError {}

impl GatewayError {
    /// HTTP status code for this terminal outcome
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Routing { .. } => 404,
            GatewayError::CsrfMissing { .. } => 403,
            GatewayError::AuthMissing { .. } => 401,
            GatewayError::RateLimited { .. } => 429,
            GatewayError::BreakerOpen { .. } => 503,
            GatewayError::UpstreamTimeout { .. } => 504,
            GatewayError::UpstreamUnreachable { .. } => 502,
            GatewayError::UpstreamServerError { .. } => 502,
            GatewayError::ConfigInvalid { .. } => 500,
            GatewayError::Internal { .. } => 500,
        }
    }

    /// Detail message carried in the envelope `message` field
    pub fn client_message(&self) -> &'static str {
        match self {
            GatewayError::Routing { .. } => "No project matches the request path.",
            GatewayError::CsrfMissing { .. } => "Missing CSRF token for write request.",
            GatewayError::AuthMissing { .. } => {
                "Authentication is required to access this resource."
            }
            GatewayError::RateLimited { .. } => "Rate limit exceeded. Please slow down.",
            GatewayError::BreakerOpen { .. } => {
                "Service is temporarily unavailable. Circuit breaker is open."
            }
            GatewayError::UpstreamTimeout { .. } => {
                "The upstream service did not respond in time. Please retry."
            }
            GatewayError::UpstreamUnreachable { .. } => {
                "Could not connect to the upstream service."
            }
            GatewayError::UpstreamServerError { .. } => {
                "The upstream service returned an error."
            }
            GatewayError::ConfigInvalid { .. } => "Invalid gateway configuration.",
            GatewayError::Internal { .. } => "An unexpected error occurred.",
        }
    }

    // Helper constructors for easier error creation with context

    pub fn routing(path: impl Into<String>) -> Self {
        GatewayError::Routing { path: path.into() }
    }

    pub fn csrf_missing(path: impl Into<String>) -> Self {
        GatewayError::CsrfMissing { path: path.into() }
    }

    pub fn auth_missing(path: impl Into<String>) -> Self {
        GatewayError::AuthMissing { path: path.into() }
    }

    pub fn rate_limited(key: impl Into<String>) -> Self {
        GatewayError::RateLimited { key: key.into() }
    }

    pub fn breaker_open(prefix: impl Into<String>) -> Self {
        GatewayError::BreakerOpen {
            prefix: prefix.into(),
        }
    }

    pub fn upstream_timeout(prefix: impl Into<String>) -> Self {
        GatewayError::UpstreamTimeout {
            prefix: prefix.into(),
        }
    }

    pub fn upstream_unreachable(prefix: impl Into<String>) -> Self {
        GatewayError::UpstreamUnreachable {
            prefix: prefix.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        GatewayError::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError::Internal {
            message: message.into(),
        }
    }
}

/// Map an HTTP status code to its reason phrase
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

/// Standardized JSON body written for every gateway-generated error.
///
/// Field order is part of the contract: timestamp, status, error, message,
/// path. The timestamp is local server time with second precision and no
/// zone suffix.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

impl ErrorEnvelope {
    /// Build an envelope stamped with the current server time.
    pub fn of(
        status: u16,
        error: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            status,
            error: error.into(),
            message: message.into(),
            path: path.into(),
        }
    }

    /// Build the envelope for a classified gateway error.
    pub fn from_error(error: &GatewayError, path: &str) -> Self {
        let status = error.status();
        Self::of(status, reason_phrase(status), error.client_message(), path)
    }

    /// Serialize to JSON, falling back to a hand-written 500 body if
    /// serialization itself fails.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize error envelope");
            format!(
                "{{\"timestamp\":\"{}\",\"status\":500,\"error\":\"Internal Server Error\",\"message\":\"Error serialization failed.\",\"path\":\"{}\"}}",
                self.timestamp, self.path
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_is_total_and_fixed() {
        assert_eq!(GatewayError::routing("/x").status(), 404);
        assert_eq!(GatewayError::csrf_missing("/x").status(), 403);
        assert_eq!(GatewayError::auth_missing("/x").status(), 401);
        assert_eq!(GatewayError::rate_limited("k").status(), 429);
        assert_eq!(GatewayError::breaker_open("/x").status(), 503);
        assert_eq!(GatewayError::upstream_timeout("/x").status(), 504);
        assert_eq!(GatewayError::upstream_unreachable("/x").status(), 502);
        assert_eq!(GatewayError::config_invalid("bad").status(), 500);
        assert_eq!(GatewayError::internal("boom").status(), 500);
    }

    #[test]
    fn test_breaker_open_message_is_fixed() {
        assert_eq!(
            GatewayError::breaker_open("/svc").client_message(),
            "Service is temporarily unavailable. Circuit breaker is open."
        );
    }

    #[test]
    fn test_timeout_and_connect_messages_are_fixed() {
        assert_eq!(
            GatewayError::upstream_timeout("/svc").client_message(),
            "The upstream service did not respond in time. Please retry."
        );
        assert_eq!(
            GatewayError::upstream_unreachable("/svc").client_message(),
            "Could not connect to the upstream service."
        );
    }

    #[test]
    fn test_envelope_has_exact_field_order() {
        let envelope = ErrorEnvelope::of(404, "Not Found", "No project", "/missing");
        let json = envelope.to_json();
        let ts_pos = json.find("\"timestamp\"").unwrap();
        let status_pos = json.find("\"status\"").unwrap();
        let error_pos = json.find("\"error\"").unwrap();
        let message_pos = json.find("\"message\"").unwrap();
        let path_pos = json.find("\"path\"").unwrap();
        assert!(ts_pos < status_pos, "timestamp must come before status");
        assert!(status_pos < error_pos, "status must come before error");
        assert!(error_pos < message_pos, "error must come before message");
        assert!(message_pos < path_pos, "message must come before path");
    }

    #[test]
    fn test_envelope_parses_back_with_matching_fields() {
        let envelope = ErrorEnvelope::from_error(&GatewayError::auth_missing("/shop/items"), "/shop/items");
        let parsed: serde_json::Value = serde_json::from_str(&envelope.to_json()).unwrap();
        assert_eq!(parsed["status"], 401);
        assert_eq!(parsed["error"], "Unauthorized");
        assert_eq!(parsed["path"], "/shop/items");
        assert!(parsed["timestamp"].is_string());
        assert!(!parsed["message"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_envelope_timestamp_has_second_precision_no_zone() {
        let envelope = ErrorEnvelope::of(500, "Internal Server Error", "boom", "/x");
        // Shape: YYYY-MM-DDTHH:MM:SS (19 chars, no zone suffix)
        assert_eq!(envelope.timestamp.len(), 19);
        assert_eq!(envelope.timestamp.as_bytes()[10], b'T');
        assert!(!envelope.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(401), "Unauthorized");
        assert_eq!(reason_phrase(429), "Too Many Requests");
        assert_eq!(reason_phrase(502), "Bad Gateway");
        assert_eq!(reason_phrase(503), "Service Unavailable");
        assert_eq!(reason_phrase(504), "Gateway Timeout");
        assert_eq!(reason_phrase(418), "Error");
    }

    #[test]
    fn test_display_carries_context() {
        let err = GatewayError::rate_limited("rate_limit:/shop:user:u_1");
        assert!(err.to_string().contains("rate_limit:/shop:user:u_1"));
    }
}
