//! CORS configuration types.
//!
//! The allowed method and header lists are fixed by the gateway contract;
//! only origins and the preflight max-age are configurable.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CORS_MAX_AGE_SECS;

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_age_secs() -> u64 {
    DEFAULT_CORS_MAX_AGE_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origin patterns; "*" allows any origin (echoed back, credentialed)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Preflight cache lifetime in seconds
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_config_defaults() {
        let config: CorsConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.max_age_secs, DEFAULT_CORS_MAX_AGE_SECS);
    }

    #[test]
    fn test_cors_config_explicit_origins() {
        let yaml = r#"
allowed_origins:
  - https://app.example.com
  - https://admin.example.com
max_age_secs: 600
"#;
        let config: CorsConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(config.max_age_secs, 600);
    }
}
