//! Signed token verification
//!
//! Key resolution order per project:
//!
//! 1. `token_public_key` - base64 X.509 RSA public key, verified as RS256
//! 2. `token_secret` - base64 HMAC secret, verified as HS256
//!
//! When both are configured the asymmetric key wins. Claims are mapped
//! `sub -> id`, `role -> role`, `plan -> plan` with `plan` defaulting to
//! `FREE`. Expiry is enforced when the claim is present and not required
//! when absent.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::fmt;

use crate::config::ProjectConfig;
use crate::identity::Identity;

/// Error type for token verification
#[derive(Debug)]
pub enum TokenError {
    /// Neither a public key nor a secret is configured
    KeyNotConfigured,
    /// Key material could not be decoded
    InvalidKey(String),
    /// Signature or claims did not verify
    Verification(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::KeyNotConfigured => write!(f, "No token key configured"),
            TokenError::InvalidKey(reason) => write!(f, "Invalid token key: {}", reason),
            TokenError::Verification(reason) => write!(f, "Token verification failed: {}", reason),
        }
    }
}

impl std::error::Error for TokenError {}

/// Claims extracted from a verified token
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

impl TokenClaims {
    fn into_identity(self) -> Identity {
        Identity::new(
            self.sub.unwrap_or_default(),
            self.role.unwrap_or_default(),
            self.plan.unwrap_or_else(|| "FREE".to_string()),
        )
    }
}

/// Verify a token against the project's key material and extract the
/// identity from its claims.
pub fn verify_token(token: &str, config: &ProjectConfig) -> Result<Identity, TokenError> {
    let (key, algorithm) = decoding_key(config)?;

    let mut validation = Validation::new(algorithm);
    // exp is enforced when present, not demanded when absent
    validation.required_spec_claims.clear();
    validation.validate_exp = true;

    let data = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)
        .map_err(|e| TokenError::Verification(e.to_string()))?;

    Ok(data.claims.into_identity())
}

/// Resolve the decoding key for a project; the asymmetric key wins
fn decoding_key(config: &ProjectConfig) -> Result<(DecodingKey, Algorithm), TokenError> {
    if let Some(public_key) = non_blank(config.token_public_key.as_deref()) {
        let key = rsa_key_from_base64_der(public_key)?;
        return Ok((key, Algorithm::RS256));
    }

    if let Some(secret) = non_blank(config.token_secret.as_deref()) {
        let bytes = BASE64
            .decode(secret)
            .map_err(|e| TokenError::InvalidKey(format!("secret is not valid base64: {}", e)))?;
        return Ok((DecodingKey::from_secret(&bytes), Algorithm::HS256));
    }

    Err(TokenError::KeyNotConfigured)
}

/// Build an RSA decoding key from a base64-encoded X.509 (SPKI) DER blob.
///
/// The DER bytes are re-wrapped as a PEM `PUBLIC KEY` block, which is the
/// container `jsonwebtoken` parses for SPKI keys.
fn rsa_key_from_base64_der(base64_der: &str) -> Result<DecodingKey, TokenError> {
    // Round-trip through the decoder to reject non-base64 input early and to
    // normalize away embedded whitespace.
    let der = BASE64
        .decode(base64_der.replace(['\n', '\r', ' '], ""))
        .map_err(|e| TokenError::InvalidKey(format!("public key is not valid base64: {}", e)))?;

    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    let encoded = BASE64.encode(der);
    let mut remaining = encoded.as_str();
    while !remaining.is_empty() {
        let split = remaining.len().min(64);
        let (line, rest) = remaining.split_at(split);
        pem.push_str(line);
        pem.push('\n');
        remaining = rest;
    }
    pem.push_str("-----END PUBLIC KEY-----\n");

    DecodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| TokenError::InvalidKey(format!("public key is not a valid RSA key: {}", e)))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
