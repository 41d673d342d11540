use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use torii::config::Config;

/// Torii API Gateway - reverse proxy with auth, rate limiting and circuit
/// breaking, built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "torii")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging subsystem
    torii::logging::init_subscriber()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    // Load configuration from file
    let config = Config::from_file(&args.config)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        projects = config.projects.len(),
        global_timeout_ms = config.gateway.global_timeout_ms,
        "Configuration loaded successfully"
    );

    // Build the gateway pipeline from the configuration snapshot
    let gateway = torii::proxy::ApiGateway::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create gateway: {}", e))?;

    // Create server instance
    let server_config = torii::server::ServerConfig::from_config(&config);
    let server = torii::server::GatewayServer::new(server_config)
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    tracing::info!(
        address = %server.config().address,
        threads = server.config().threads,
        "Starting Torii API Gateway"
    );

    server
        .run(gateway)
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
