//! MCP server binary entry point.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use trino_mcp::{
    cache::ConnectionCache,
    config::ServerConfig,
    database::TrinoConnector,
    protocol::McpServerBuilder,
    server::{McpHandler, ServerStateBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = ServerConfig::builder().from_env()?.build()?;
    info!(
        "Connection cache: {} connections, {}s TTL",
        config.cache.max_connections,
        config.cache.connection_ttl.as_secs()
    );

    let connector = TrinoConnector::new(config.trino.clone())?;
    let cache = Arc::new(ConnectionCache::new(
        config.cache.clone(),
        Arc::new(connector),
    ));

    let name = config.name.to_string();
    let version = config.version.to_string();
    let state = Arc::new(
        ServerStateBuilder::new()
            .config(config)
            .cache(Arc::clone(&cache))
            .build()?,
    );
    info!("Server state initialized with {} tools", state.tools.len());

    let server = McpServerBuilder::new()
        .handler(Arc::new(McpHandler::new(state)))
        .name(name)
        .version(version)
        .build()?;

    info!("MCP server ready, waiting for requests...");
    let outcome = server.run().await;

    cache.release_all().await;
    info!("Server shutdown complete");
    outcome?;
    Ok(())
}

/// JSON logs to stderr; stdout carries the protocol.
///
/// The filter comes from `RUST_LOG`, then `LOG_LEVEL` (e.g. `INFO`), then a
/// crate-level default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("LOG_LEVEL")
                .map_err(|e| e.to_string())
                .and_then(|level| {
                    EnvFilter::try_new(level.to_lowercase()).map_err(|e| e.to_string())
                })
        })
        .unwrap_or_else(|_| EnvFilter::new("trino_mcp=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
