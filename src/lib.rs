//! MCP server for Trino.
//!
//! Tools take a `jdbc:trino://` connection string per call; connections are
//! opened on demand, cached per string with a TTL and capacity bound, and
//! probed before reuse. Alongside metadata browsing and query execution the
//! server offers pattern-based DDL analysis and guarded DDL execution.
//!
//! # Example
//!
//! ```no_run
//! use trino_mcp::{
//!     config::ServerConfig,
//!     protocol::McpServerBuilder,
//!     server::{McpHandler, ServerStateBuilder},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::builder().from_env()?.build()?;
//!
//!     // Builds a Trino-backed connection cache from the config
//!     let state = Arc::new(ServerStateBuilder::new().config(config).build()?);
//!     let cache = Arc::clone(&state.cache);
//!
//!     let server = McpServerBuilder::new()
//!         .handler(Arc::new(McpHandler::new(state)))
//!         .build()?;
//!
//!     server.run().await?;
//!     cache.release_all().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod ddl;
pub mod error;
pub mod protocol;
pub mod security;
pub mod server;
pub mod tools;

pub use cache::{ConnectionCache, ConnectionLease};
pub use config::{CacheConfig, QueryLimits, ServerConfig, TrinoConfig};
pub use database::{ConnectionParams, ConnectionStringParser, TrinoConnector};
pub use ddl::{DdlAnalyzer, DdlReport, DdlType};
pub use error::{McpError, Result};
pub use protocol::{McpServer, McpServerBuilder};
pub use server::{McpHandler, ServerState, ServerStateBuilder};
