//! Streamable HTTP host for the MCP server.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use axum::Router;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wfgate_cache::ResultCache;

use crate::server::core::{GatewayServices, WfgateMcpCore};

/// Path the MCP endpoint is mounted at.
pub const MCP_ENDPOINT_PATH: &str = "/mcp";

/// Host configuration for an MCP HTTP server instance.
#[derive(Debug, Clone)]
pub struct McpHttpServer {
    bind_address: SocketAddr,
    services: Arc<GatewayServices>,
    sweep_interval: Option<Duration>,
}

impl McpHttpServer {
    /// Create a new MCP HTTP server bound to the provided address.
    pub fn new(bind_address: SocketAddr, services: Arc<GatewayServices>) -> Self {
        Self {
            bind_address,
            services,
            sweep_interval: None,
        }
    }

    /// Periodically purge expired cache entries. Expiry on read happens regardless.
    pub fn with_cache_sweeper(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval.filter(|interval| !interval.is_zero());
        self
    }

    /// Start the server and return a handle for runtime inspection and shutdown.
    pub async fn start(self) -> Result<RunningMcpHttpServer> {
        let cancellation_token = CancellationToken::new();
        let session_manager = Arc::new(LocalSessionManager::default());
        let sweeper_handle = match self.sweep_interval {
            Some(interval) if self.services.cache().is_enabled() => Some(spawn_cache_sweeper(
                Arc::clone(self.services.cache()),
                interval,
                cancellation_token.child_token(),
            )),
            _ => None,
        };

        let services = Arc::clone(&self.services);
        let service: StreamableHttpService<WfgateMcpCore, LocalSessionManager> = StreamableHttpService::new(
            move || Ok(WfgateMcpCore::new(Arc::clone(&services))),
            session_manager,
            StreamableHttpServerConfig {
                stateful_mode: true,
                sse_keep_alive: None,
                cancellation_token: cancellation_token.child_token(),
                ..Default::default()
            },
        );

        let router = Router::new().nest_service(MCP_ENDPOINT_PATH, service);
        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;
        let bound_address = listener.local_addr()?;
        info!(address = %bound_address, path = MCP_ENDPOINT_PATH, "MCP HTTP server listening");

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                if let Err(error) = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await
                {
                    warn!(%error, "MCP HTTP server stopped with an error");
                }
            }
        });

        Ok(RunningMcpHttpServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
            sweeper_handle,
        })
    }
}

/// Runtime handle for a running MCP HTTP server.
#[derive(Debug)]
pub struct RunningMcpHttpServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
    sweeper_handle: Option<JoinHandle<()>>,
}

impl RunningMcpHttpServer {
    /// Return the bound socket address for the running server.
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop the server and wait for background tasks to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        if let Some(sweeper_handle) = self.sweeper_handle {
            sweeper_handle
                .await
                .map_err(|error| anyhow!("cache sweeper task failed: {error}"))?;
        }
        self.server_handle
            .await
            .map_err(|error| anyhow!("MCP HTTP server task failed: {error}"))?;
        Ok(())
    }
}

/// Resolve the listen address from a host and port.
pub fn resolve_bind_address(host: &str, port: u16) -> Result<SocketAddr> {
    let host = host.trim();
    let address: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|error| anyhow!("invalid MCP HTTP bind host '{host}': {error}"))?;
    Ok(SocketAddr::new(address, port))
}

fn spawn_cache_sweeper(
    cache: Arc<dyn ResultCache>,
    interval: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = ticker.tick() => {
                    let cache = Arc::clone(&cache);
                    match tokio::task::spawn_blocking(move || cache.purge_expired()).await {
                        Ok(Ok(removed)) => debug!(removed, "purged expired cache entries"),
                        Ok(Err(error)) => warn!(%error, "cache sweep failed"),
                        Err(error) => warn!(%error, "cache sweep task failed"),
                    }
                }
            }
        }
    })
}
