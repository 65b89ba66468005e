//! Handler trait and method dispatcher.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::*;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// MCP methods a tool server answers.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult>;

    /// Client confirmed initialization.
    async fn initialized(&self) -> ProtocolResult<()>;

    async fn shutdown(&self) -> ProtocolResult<()>;

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult>;

    async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult>;

    async fn ping(&self) -> ProtocolResult<Value> {
        Ok(serde_json::json!({}))
    }
}

/// Routes requests to a [`Handler`] and wraps results in JSON-RPC responses.
pub struct Dispatcher<H: Handler> {
    handler: Arc<H>,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Dispatching request: {}", request.method);

        let result = match request.method.as_str() {
            _ if request.jsonrpc != JSONRPC_VERSION => Err(ProtocolError::InvalidRequest(
                format!("Unsupported JSON-RPC version: {}", request.jsonrpc).into(),
            )),
            "initialize" => match parse_params(request.params) {
                Ok(params) => to_value(self.handler.initialize(params).await),
                Err(e) => Err(e),
            },
            "initialized" | "notifications/initialized" => {
                self.handler.initialized().await.map(|()| Value::Null)
            }
            "shutdown" => self.handler.shutdown().await.map(|()| Value::Null),
            "ping" => self.handler.ping().await,
            "tools/list" => to_value(self.handler.list_tools().await),
            "tools/call" => match parse_params(request.params) {
                Ok(params) => to_value(self.handler.call_tool(params).await),
                Err(e) => Err(e),
            },
            method => {
                warn!("Unknown method: {}", method);
                Err(ProtocolError::MethodNotFound(method.to_string()))
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                error!("Request failed: {}", e);
                JsonRpcResponse::error(request.id, JsonRpcError::from(&e))
            }
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> ProtocolResult<T> {
    let params = params.ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))?;
    serde_json::from_value(params).map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))
}

fn to_value<T: Serialize>(result: ProtocolResult<T>) -> ProtocolResult<Value> {
    let value = result?;
    serde_json::to_value(value).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}
