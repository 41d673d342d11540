//! Shared key-value store access
//!
//! The gateway uses one store (redis) for two things:
//!
//! - session authentication: key existence under `spring:session:sessions:`
//! - rate limiting: an atomic server-side script evaluating the token bucket
//!
//! The connection is an async multiplexed [`ConnectionManager`], created
//! lazily on first use so a store outage at startup does not prevent the
//! gateway from serving (the limiter fails open, sessions resolve Absent).
//! The limiter script handle is compiled once and shared across requests.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::fmt;
use tokio::sync::OnceCell;

use crate::constants::SESSION_KEY_PREFIX;

/// Token bucket decision, evaluated atomically on the store.
///
/// Server-side time only: accepting gateway-supplied timestamps would let
/// clock drift between gateway nodes re-fill buckets early. Returns
/// `{allowed, floor(tokens)}`; `last_refilled` is advanced only when tokens
/// were actually added.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local requested = tonumber(ARGV[3])

local now = tonumber(redis.call('TIME')[1])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refilled')
local tokens = tonumber(bucket[1])
local last_refilled = tonumber(bucket[2])

if tokens == nil then
  tokens = capacity
  last_refilled = now
end

local delta = math.max(0, now - last_refilled)
local filled = math.min(capacity, tokens + delta * refill_rate)
if filled > tokens then
  last_refilled = now
end
tokens = filled

local allowed = 0
if tokens >= requested then
  tokens = tokens - requested
  allowed = 1
end

local ttl = 60
if refill_rate > 0 then
  ttl = math.ceil(capacity / refill_rate * 2)
end

redis.call('HMSET', key, 'tokens', tokens, 'last_refilled', last_refilled)
redis.call('EXPIRE', key, ttl)

return { allowed, math.floor(tokens) }
"#;

/// Errors from the key-value store
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Could not establish or reuse a connection
    Connection(String),
    /// A command or script evaluation failed
    Command(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(message) => write!(f, "Store connection error: {}", message),
            StoreError::Command(message) => write!(f, "Store command error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// Gateway-facing handle on the shared store
pub struct GatewayStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    limiter_script: Script,
}

impl GatewayStore {
    /// Create the store handle. Validates the URL but does not connect;
    /// the connection is established on first use.
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("Invalid redis URL: {}", e)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            limiter_script: Script::new(TOKEN_BUCKET_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))
            })
            .await?;
        Ok(manager.clone())
    }

    /// Test whether a server-held session exists
    pub async fn session_exists(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let key = format!("{}{}", SESSION_KEY_PREFIX, session_id);
        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(exists)
    }

    /// Evaluate the token bucket script for one request.
    ///
    /// Returns `(allowed, remaining_tokens_floor)`. The gateway never passes
    /// a timestamp; the script reads server time.
    pub async fn eval_token_bucket(
        &self,
        key: &str,
        capacity: u64,
        refill_rate: u64,
    ) -> Result<(i64, i64), StoreError> {
        let mut conn = self.connection().await?;
        let result: Vec<i64> = self
            .limiter_script
            .key(key)
            .arg(capacity)
            .arg(refill_rate)
            .arg(1)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;

        let allowed = result.first().copied().unwrap_or(0);
        let remaining = result.get(1).copied().unwrap_or(0);
        Ok((allowed, remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_redis_url() {
        assert!(GatewayStore::new("not-a-url").is_err());
    }

    #[test]
    fn test_accepts_valid_redis_url_without_connecting() {
        // No redis server is required: the connection is lazy.
        assert!(GatewayStore::new("redis://127.0.0.1:6379").is_ok());
    }

    #[test]
    fn test_script_reads_server_time_not_client_arguments() {
        // The script must take its clock from the store, never from ARGV.
        assert!(TOKEN_BUCKET_SCRIPT.contains("redis.call('TIME')"));
        assert!(!TOKEN_BUCKET_SCRIPT.contains("ARGV[4]"));
    }

    #[test]
    fn test_script_refreshes_ttl() {
        assert!(TOKEN_BUCKET_SCRIPT.contains("EXPIRE"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "Store connection error: refused");
        let err = StoreError::Command("NOSCRIPT".to_string());
        assert_eq!(err.to_string(), "Store command error: NOSCRIPT");
    }
}
