//! MCP request handler implementation.

use crate::error::ProtocolResult;
use crate::protocol::{
    CallToolParams, CallToolResult, Handler, Implementation, InitializeParams, InitializeResult,
    ListToolsResult, MCP_VERSION, ServerCapabilities,
};
use crate::server::state::ServerState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

const INSTRUCTIONS: &str = "Trino MCP server. Every database tool takes a `jdbc_url` of the form \
    jdbc:trino://host:port?user=<user>[&password=...][&catalog=...][&schema=...]; connections are \
    cached per connection string. \
    Metadata: connection_status, list_catalogs, list_schemas, list_tables, describe_table. \
    Queries: execute_query, analyze_queries. \
    DDL: validate_ddl_statements, execute_ddl_statements. \
    Diagnostics: get_connection_stats.";

/// MCP request handler that processes protocol messages.
pub struct McpHandler {
    state: Arc<ServerState>,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult> {
        info!(
            "Initialize request from {} v{}",
            params.client_info.name, params.client_info.version
        );
        debug!("Client capabilities: {}", params.capabilities);

        self.state.set_initialized(params.client_info);

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities: ServerCapabilities::tools(),
            server_info: Implementation {
                name: self.state.config.name.to_string(),
                version: self.state.config.version.to_string(),
            },
            instructions: Some(INSTRUCTIONS.into()),
        })
    }

    async fn initialized(&self) -> ProtocolResult<()> {
        info!("Server initialized successfully");
        Ok(())
    }

    async fn shutdown(&self) -> ProtocolResult<()> {
        info!("Shutdown request received, releasing cached connections");
        self.state.cache.release_all().await;
        Ok(())
    }

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
        let tools = self.state.tools.list();
        debug!("Listing {} tools", tools.len());
        Ok(ListToolsResult { tools })
    }

    #[instrument(skip(self, params), fields(tool = %params.name))]
    async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult> {
        match self.state.tools.execute(params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Tool execution error: {}", e);
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}
