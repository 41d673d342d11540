// Server module - Pingora HTTP server setup and configuration

use pingora::server::configuration::Opt as ServerOpt;
use pingora::server::Server;

use crate::config::Config;
use crate::proxy::ApiGateway;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub address: String,
    /// Number of worker threads
    pub threads: usize,
}

impl ServerConfig {
    /// Create ServerConfig from application Config
    pub fn from_config(config: &Config) -> Self {
        // Combine address and port into a single socket address
        let address = format!("{}:{}", config.server.address, config.server.port);

        Self {
            address,
            threads: config.server.threads,
        }
    }
}

/// Gateway HTTP server wrapper around Pingora
pub struct GatewayServer {
    config: ServerConfig,
    server_opt: ServerOpt,
}

impl GatewayServer {
    /// Create a new GatewayServer instance
    pub fn new(config: ServerConfig) -> Result<Self, String> {
        let mut server_opt = ServerOpt::default();
        server_opt.upgrade = false;
        server_opt.daemon = false;
        server_opt.nocapture = false;
        server_opt.test = false;
        server_opt.conf = None;

        Ok(Self { config, server_opt })
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bootstrap Pingora and serve the gateway forever
    pub fn run(self, gateway: ApiGateway) -> Result<(), String> {
        let mut server = Server::new(Some(self.server_opt))
            .map_err(|e| format!("Failed to create Pingora server: {}", e))?;
        server.bootstrap();

        let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, gateway);
        proxy_service.add_tcp(&self.config.address);
        server.add_service(proxy_service);

        server.run_forever()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_from_config() {
        let config = Config::from_yaml(
            r#"
server:
  address: 127.0.0.1
  port: 8088
  threads: 2
"#,
        )
        .unwrap();
        let server_config = ServerConfig::from_config(&config);
        assert_eq!(server_config.address, "127.0.0.1:8088");
        assert_eq!(server_config.threads, 2);
    }

    #[test]
    fn test_server_config_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        let server_config = ServerConfig::from_config(&config);
        assert_eq!(server_config.address, "0.0.0.0:8080");
        assert_eq!(server_config.threads, 4);
    }

    #[test]
    fn test_server_creation() {
        let server_config = ServerConfig {
            address: "127.0.0.1:8080".to_string(),
            threads: 4,
        };
        let server = GatewayServer::new(server_config).unwrap();
        assert_eq!(server.config().address, "127.0.0.1:8080");
    }
}
