use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use wfgate_cache::open_result_cache;
use wfgate_engine::{HttpWorkflowEngine, WorkflowEngine};
use wfgate_mcp::config::{GatewayConfig, default_config_path, load_config_from_path};
use wfgate_mcp::{GatewayServices, McpHttpServer, resolve_bind_address};

/// Serve Temporal workflows as MCP tools over streamable HTTP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file (defaults to $WFGATE_CONFIG, then config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8081)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    info!("Starting Temporal MCP HTTP server...");

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = load_config_from_path(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    info!(workflows = config.workflows.len(), path = %config_path.display(), "loaded configuration");

    let cache_settings = config.cache_settings()?;
    let cache = open_result_cache(&cache_settings).context("failed to open result cache")?;
    let engine = connect_engine(&config).await;

    let services = Arc::new(GatewayServices::from_config(&config, engine, cache)?);
    for tool in services.catalog().iter() {
        info!(tool = %tool.name(), task_queue = %tool.task_queue(), "registered workflow tool");
    }

    let bind_address = resolve_bind_address(&args.host, args.port)?;
    let server = McpHttpServer::new(bind_address, services)
        .with_cache_sweeper(cache_settings.cleanup_interval)
        .start()
        .await
        .with_context(|| format!("failed to start MCP HTTP server on {bind_address}"))?;
    info!("MCP endpoint available at: http://{}/mcp", server.bound_address());

    shutdown_signal().await;
    info!("shutting down server...");
    server.stop().await?;
    info!("Temporal MCP HTTP server has been stopped.");
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Connects to the engine; on failure the server keeps running and can only serve cached results.
async fn connect_engine(config: &GatewayConfig) -> Option<Arc<dyn WorkflowEngine>> {
    let settings = match config.engine_settings() {
        Ok(settings) => settings,
        Err(error) => {
            warn!(%error, "invalid Temporal settings");
            return None;
        }
    };
    match HttpWorkflowEngine::connect(&settings).await {
        Ok(engine) => {
            info!(host_port = %settings.host_port, "Connected to Temporal service");
            Some(Arc::new(engine))
        }
        Err(error) => {
            warn!(%error, "Failed to connect to Temporal service");
            warn!("MCP will run in degraded mode - workflow executions will return errors");
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
