//! Rate Limiting with Token Bucket Algorithm
//!
//! Limits request rates per (project, subject) fingerprint:
//!
//! - authenticated callers are keyed by user id: `rate_limit:<prefix>:user:<id>`
//! - anonymous callers fall back to the client IP: `rate_limit:<prefix>:ip:<ip>`
//!
//! The decision executes as a single atomic script on the shared store so
//! that concurrent gateway instances share bucket state without a
//! distributed lock. The script uses server-side time; the gateway never
//! passes timestamps (clock drift between nodes would allow bursting).
//!
//! ## Failure policy
//!
//! Store failures fail open: the limiter is defence in depth, and a store
//! outage must not take the whole gateway down.

use std::sync::Arc;

use crate::config::ProjectConfig;
use crate::constants::RATE_LIMIT_KEY_PREFIX;
use crate::identity::Identity;
use crate::store::GatewayStore;

pub struct RateLimiter {
    store: Arc<GatewayStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    /// Build the bucket key for a request.
    ///
    /// Authenticated (non-anonymous) identities are keyed by user id so a
    /// user's budget follows them across addresses; everyone else shares
    /// per-IP buckets.
    pub fn limiter_key(prefix: &str, identity: &Identity, client_ip: &str) -> String {
        if !identity.is_anonymous() {
            format!("{}:{}:user:{}", RATE_LIMIT_KEY_PREFIX, prefix, identity.id)
        } else {
            format!("{}:{}:ip:{}", RATE_LIMIT_KEY_PREFIX, prefix, client_ip)
        }
    }

    /// Check whether a request is admitted by the project's token bucket.
    ///
    /// Projects without a `rate_limit` section admit everything.
    pub async fn is_allowed(
        &self,
        config: &ProjectConfig,
        identity: &Identity,
        client_ip: &str,
    ) -> bool {
        let Some(limit) = &config.rate_limit else {
            return true;
        };

        let key = Self::limiter_key(&config.prefix, identity, client_ip);

        match self
            .store
            .eval_token_bucket(&key, limit.capacity, limit.refill_rate)
            .await
        {
            Ok((allowed, remaining)) => {
                tracing::debug!(
                    key = %key,
                    allowed = allowed,
                    remaining = remaining,
                    "Token bucket decision"
                );
                allowed == 1
            }
            Err(e) => {
                // Fail open: a store outage must not become a gateway outage
                tracing::error!(
                    key = %key,
                    error = %e,
                    "Rate limiter store error, failing open"
                );
                true
            }
        }
    }
}
