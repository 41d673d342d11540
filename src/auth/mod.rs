// Authentication module
//
// Two modes per project: signed bearer tokens (HMAC or RSA) and server-held
// sessions looked up in the store. Verification failures are deliberately
// indistinguishable from missing credentials at this stage; the pipeline
// decides between the anonymous identity and 401 afterwards.

pub mod token;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AuthType, ProjectConfig};
use crate::identity::Identity;
use crate::store::GatewayStore;

pub use token::{verify_token, TokenError};

/// Outcome of the authentication stage
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// A verified identity
    Authenticated(Identity),
    /// No usable credentials; the caller decides public-path vs 401
    Absent,
}

/// Extract a bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HashMap<String, String>) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/// Extract a named cookie value from the Cookie header
pub fn extract_cookie(headers: &HashMap<String, String>, name: &str) -> Option<String> {
    let raw = headers.get("cookie")?;
    for pair in raw.split(';') {
        if let Some((key, value)) = pair.split_once('=') {
            if key.trim() == name {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Token location: Authorization header first, then the configured cookie
fn extract_token(headers: &HashMap<String, String>, config: &ProjectConfig) -> Option<String> {
    extract_bearer_token(headers).or_else(|| {
        config
            .token_cookie_name
            .as_deref()
            .and_then(|name| extract_cookie(headers, name))
    })
}

/// Authenticator over the shared store
pub struct Authenticator {
    store: Arc<GatewayStore>,
}

impl Authenticator {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    /// Authenticate a request against the matched project configuration.
    ///
    /// Header names in `headers` are lowercase. No body reads, no side
    /// effects beyond logging.
    pub async fn authenticate(
        &self,
        headers: &HashMap<String, String>,
        config: &ProjectConfig,
    ) -> AuthOutcome {
        match config.auth_type {
            AuthType::Token => self.authenticate_token(headers, config),
            AuthType::Session => self.authenticate_session(headers, config).await,
        }
    }

    fn authenticate_token(
        &self,
        headers: &HashMap<String, String>,
        config: &ProjectConfig,
    ) -> AuthOutcome {
        let Some(token) = extract_token(headers, config) else {
            return AuthOutcome::Absent;
        };

        match verify_token(&token, config) {
            Ok(identity) => AuthOutcome::Authenticated(identity),
            Err(TokenError::KeyNotConfigured) => {
                tracing::error!(
                    prefix = %config.prefix,
                    "No token key configured for project"
                );
                AuthOutcome::Absent
            }
            Err(e) => {
                // Invalid tokens are indistinguishable from missing ones here
                tracing::warn!(
                    prefix = %config.prefix,
                    error = %e,
                    "Token validation failed"
                );
                AuthOutcome::Absent
            }
        }
    }

    async fn authenticate_session(
        &self,
        headers: &HashMap<String, String>,
        config: &ProjectConfig,
    ) -> AuthOutcome {
        let Some(session_id) = extract_cookie(headers, &config.session_cookie_name) else {
            return AuthOutcome::Absent;
        };

        match self.store.session_exists(&session_id).await {
            Ok(true) => AuthOutcome::Authenticated(Identity::session_user()),
            Ok(false) => AuthOutcome::Absent,
            Err(e) => {
                tracing::warn!(
                    prefix = %config.prefix,
                    error = %e,
                    "Session lookup failed, treating as absent"
                );
                AuthOutcome::Absent
            }
        }
    }
}
