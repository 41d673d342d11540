// Token authentication behaviour with real signed tokens.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use std::collections::HashMap;

use torii::auth::{extract_bearer_token, extract_cookie, verify_token, TokenError};
use torii::config::{AuthType, ProjectConfig};

#[derive(Serialize)]
struct Claims {
    sub: String,
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<String>,
}

const SECRET: &[u8] = b"integration-test-secret";

fn token_project() -> ProjectConfig {
    ProjectConfig {
        prefix: "/shop".to_string(),
        target_url: "http://shop:8081".to_string(),
        auth_type: AuthType::Token,
        token_secret: Some(BASE64.encode(SECRET)),
        token_public_key: None,
        token_cookie_name: Some("AUTH_TOKEN".to_string()),
        session_cookie_name: "SESSION".to_string(),
        csrf_required: false,
        public_paths: Vec::new(),
        rate_limit: None,
        circuit_breaker: None,
        time_limiter: None,
    }
}

fn sign(claims: &Claims) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

#[test]
fn valid_token_maps_claims_to_identity() {
    let token = sign(&Claims {
        sub: "u1".to_string(),
        role: "ROLE_USER".to_string(),
        plan: Some("PRO".to_string()),
    });

    let identity = verify_token(&token, &token_project()).unwrap();
    assert_eq!(identity.id, "u1");
    assert_eq!(identity.role, "ROLE_USER");
    assert_eq!(identity.plan, "PRO");
}

#[test]
fn plan_defaults_to_free_when_claim_missing() {
    let token = sign(&Claims {
        sub: "u2".to_string(),
        role: "ROLE_ADMIN".to_string(),
        plan: None,
    });

    let identity = verify_token(&token, &token_project()).unwrap();
    assert_eq!(identity.plan, "FREE");
}

#[test]
fn tampered_token_is_rejected() {
    let token = sign(&Claims {
        sub: "u1".to_string(),
        role: "ROLE_USER".to_string(),
        plan: None,
    });

    // Flip a character in the payload segment
    let mut parts: Vec<String> = token.split('.').map(|s| s.to_string()).collect();
    parts[1] = format!("{}x", parts[1]);
    let tampered = parts.join(".");

    assert!(matches!(
        verify_token(&tampered, &token_project()),
        Err(TokenError::Verification(_))
    ));
}

#[test]
fn misconfigured_project_reports_missing_key() {
    let mut config = token_project();
    config.token_secret = None;

    assert!(matches!(
        verify_token("whatever", &config),
        Err(TokenError::KeyNotConfigured)
    ));
}

#[test]
fn bearer_header_and_cookie_extraction() {
    let mut headers: HashMap<String, String> = HashMap::new();
    headers.insert(
        "authorization".to_string(),
        "Bearer header-token".to_string(),
    );
    headers.insert(
        "cookie".to_string(),
        "AUTH_TOKEN=cookie-token; SESSION=sess-1".to_string(),
    );

    assert_eq!(
        extract_bearer_token(&headers),
        Some("header-token".to_string())
    );
    assert_eq!(
        extract_cookie(&headers, "AUTH_TOKEN"),
        Some("cookie-token".to_string())
    );
    assert_eq!(extract_cookie(&headers, "SESSION"), Some("sess-1".to_string()));
    assert_eq!(extract_cookie(&headers, "OTHER"), None);
}
