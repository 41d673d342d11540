// Configuration module

pub mod cors;
pub mod project;
pub mod server;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_GLOBAL_TIMEOUT_MS;

pub use cors::CorsConfig;
pub use project::{
    AuthType, CircuitBreakerConfigYaml, ProjectConfig, RateLimitConfigYaml, TimeLimiterConfigYaml,
};
pub use server::ServerConfig;

fn default_global_timeout_ms() -> u64 {
    DEFAULT_GLOBAL_TIMEOUT_MS
}

/// Gateway-wide tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Global request timeout in milliseconds
    #[serde(default = "default_global_timeout_ms")]
    pub global_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            global_timeout_ms: default_global_timeout_ms(),
        }
    }
}

/// Root configuration loaded once at startup and never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub projects: HashMap<String, ProjectConfig>,
}

impl Config {
    /// Load and validate configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config file {}: {}", path.display(), e))?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|e| format!("Invalid config YAML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration tree
    ///
    /// Prefixes must be pairwise distinct: resolution disambiguates nested
    /// prefixes by length, but two projects claiming the same prefix would
    /// make routing ambiguous.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen_prefixes: HashMap<&str, &str> = HashMap::new();

        for (name, project) in &self.projects {
            project.validate(name)?;

            if let Some(other) = seen_prefixes.insert(project.prefix.as_str(), name.as_str()) {
                return Err(format!(
                    "Projects '{}' and '{}' share the same prefix '{}'",
                    other, name, project.prefix
                ));
            }
        }

        Ok(())
    }
}
