//! Server loop with lifecycle tracking.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycle {
    Created,
    /// `initialize` answered, waiting for the client's confirmation.
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

pub struct McpServer<H: Handler> {
    info: Implementation,
    handler: Arc<H>,
    lifecycle: RwLock<ServerLifecycle>,
    running: AtomicBool,
}

impl<H: Handler> McpServer<H> {
    pub fn new(handler: Arc<H>, info: Implementation) -> Self {
        Self {
            info,
            handler,
            lifecycle: RwLock::new(ServerLifecycle::Created),
            running: AtomicBool::new(false),
        }
    }

    pub fn info(&self) -> &Implementation {
        &self.info
    }

    pub async fn lifecycle(&self) -> ServerLifecycle {
        *self.lifecycle.read().await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Serves stdin/stdout until EOF or `shutdown`.
    #[instrument(skip(self), fields(server = %self.info.name))]
    pub async fn run(&self) -> Result<()> {
        self.run_with_transport(&StdioTransport::stdio()).await
    }

    pub async fn run_with_transport<T: Transport>(&self, transport: &T) -> Result<()> {
        info!("Starting MCP server: {} v{}", self.info.name, self.info.version);
        self.running.store(true, Ordering::SeqCst);

        let dispatcher = Dispatcher::new(Arc::clone(&self.handler));

        while self.running.load(Ordering::SeqCst) {
            let message = match transport.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(ProtocolError::ParseError)) => {
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    if let Err(e) = transport.write_response(&response).await {
                        error!("Failed to send error response: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    self.finish().await;
                    return Err(e);
                }
            };

            let request = match message {
                Message::Request(request) => request,
                Message::Response(response) => {
                    warn!("Unexpected response received: {:?}", response.id);
                    continue;
                }
            };

            let is_notification = request.is_notification();
            let is_shutdown = request.method == "shutdown";
            self.advance(&request.method).await;

            let response = dispatcher.dispatch(request).await;
            if !is_notification && let Err(e) = transport.write_response(&response).await {
                error!("Failed to send response: {}", e);
            }

            if is_shutdown {
                self.stop();
            }
        }

        self.finish().await;
        Ok(())
    }

    /// Stops the loop after the current message.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn advance(&self, method: &str) {
        let mut lifecycle = self.lifecycle.write().await;
        match (method, *lifecycle) {
            ("initialize", ServerLifecycle::Created) => {
                *lifecycle = ServerLifecycle::Initializing;
            }
            ("initialized" | "notifications/initialized", ServerLifecycle::Initializing) => {
                *lifecycle = ServerLifecycle::Running;
                info!("Server initialized and running");
            }
            ("shutdown", _) => *lifecycle = ServerLifecycle::ShuttingDown,
            _ => {}
        }
    }

    async fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.lifecycle.write().await = ServerLifecycle::Stopped;
        info!("Server stopped");
    }
}

pub struct McpServerBuilder<H: Handler> {
    handler: Option<Arc<H>>,
    name: String,
    version: String,
}

impl<H: Handler> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn handler(mut self, handler: Arc<H>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            Implementation {
                name: self.name,
                version: self.version,
            },
        ))
    }
}

impl<H: Handler> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::handler::tests::EchoHandler;
    use crate::protocol::transport::LineTransport;
    use serde_json::Value;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex, split};

    #[test]
    fn test_builder_requires_handler() {
        assert!(McpServerBuilder::<EchoHandler>::new().build().is_err());

        let server = McpServerBuilder::new()
            .handler(Arc::new(EchoHandler::default()))
            .name("trino-test")
            .version("9.9.9")
            .build()
            .unwrap();
        assert_eq!(server.info().name, "trino-test");
        assert_eq!(server.info().version, "9.9.9");
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_session_over_duplex() {
        let handler = Arc::new(EchoHandler::default());
        let server = McpServerBuilder::new()
            .handler(Arc::clone(&handler))
            .build()
            .unwrap();

        let (client, server_io) = duplex(16 * 1024);
        let (read, write) = split(server_io);
        let transport = LineTransport::new(BufReader::new(read), write);

        let (client_read, mut client_write) = split(client);
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"1"}}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "{oops",
            r#"{"jsonrpc":"2.0","id":3,"method":"shutdown"}"#,
            r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#,
        ]
        .join("\n");
        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.write_all(b"\n").await.unwrap();

        server.run_with_transport(&transport).await.unwrap();
        drop(transport);

        let mut lines = BufReader::new(client_read).lines();
        let mut responses = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            responses.push(serde_json::from_str::<Value>(&line).unwrap());
        }

        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["result"]["tools"][0]["name"], "echo");
        assert_eq!(responses[2]["error"]["code"], -32700);
        assert_eq!(responses[3]["id"], 3);

        assert!(handler.initialized.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(handler.shutdowns.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(server.lifecycle().await, ServerLifecycle::Stopped);
    }

    #[tokio::test]
    async fn test_eof_stops_server() {
        let server = McpServerBuilder::new()
            .handler(Arc::new(EchoHandler::default()))
            .build()
            .unwrap();

        let (client, server_io) = duplex(1024);
        drop(client);
        let (read, write) = split(server_io);
        let transport = LineTransport::new(BufReader::new(read), write);

        server.run_with_transport(&transport).await.unwrap();
        assert_eq!(server.lifecycle().await, ServerLifecycle::Stopped);
    }
}
