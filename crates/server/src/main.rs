//! urlvault server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use urlvault_core::AppConfig;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let cache = urlvault_client::shared_cache_with(&config).await?;

    tracing::info!(cache_dir = %config.cache_dir.display(), "Starting urlvault server on stdio transport");

    let handler = handler::UrlVaultServer::new(cache.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    // Held work would otherwise be lost on exit.
    cache.resume();
    cache.wait_idle().await;
    tracing::info!("urlvault server stopped");

    Ok(())
}
