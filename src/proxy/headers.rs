//! Header sanitisation for proxied requests and responses
//!
//! Hop-by-hop headers and anything a client might use to spoof the
//! gateway's identity assertions (`X-User-*`) are stripped in both
//! directions; the verified identity headers are then injected
//! unconditionally on the upstream request.

use pingora_core::Result;
use pingora_http::{RequestHeader, ResponseHeader};

use crate::constants::{X_USER_ID, X_USER_PLAN, X_USER_ROLE};
use crate::identity::Identity;

/// Headers never forwarded in either direction (lowercase)
const IGNORED_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "proxy-authorization",
    "proxy-authenticate",
];

/// True when a header must not cross the gateway
pub fn is_ignored_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IGNORED_HEADERS.contains(&lower.as_str()) || lower.starts_with("x-user-")
}

/// Strip ignored headers from the upstream request
pub fn sanitize_request(upstream_request: &mut RequestHeader) {
    let to_remove: Vec<String> = upstream_request
        .headers
        .iter()
        .filter(|(name, _)| is_ignored_header(name.as_str()))
        .map(|(name, _)| name.to_string())
        .collect();

    for name in to_remove {
        upstream_request.remove_header(name.as_str());
    }
}

/// Strip ignored headers from the response before it reaches the client
pub fn sanitize_response(upstream_response: &mut ResponseHeader) {
    let to_remove: Vec<String> = upstream_response
        .headers
        .iter()
        .filter(|(name, _)| is_ignored_header(name.as_str()))
        .map(|(name, _)| name.to_string())
        .collect();

    for name in to_remove {
        upstream_response.remove_header(name.as_str());
    }
}

/// Set the identity headers on the upstream request.
///
/// Always runs after sanitisation, so client-supplied `X-User-*` values can
/// never leak through.
pub fn inject_identity(upstream_request: &mut RequestHeader, identity: &Identity) -> Result<()> {
    upstream_request.insert_header(X_USER_ID, identity.id.as_str())?;
    upstream_request.insert_header(X_USER_ROLE, identity.role.as_str())?;
    upstream_request.insert_header(X_USER_PLAN, identity.plan.as_str())?;
    Ok(())
}
