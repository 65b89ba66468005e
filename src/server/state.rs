//! Server state management.

use crate::cache::ConnectionCache;
use crate::config::ServerConfig;
use crate::database::TrinoConnector;
use crate::error::Result;
use crate::protocol::Implementation;
use crate::tools::{ToolRegistry, create_registry};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub struct ServerState {
    pub config: ServerConfig,
    pub cache: Arc<ConnectionCache>,
    pub tools: ToolRegistry,
    initialized: AtomicBool,
    client_info: RwLock<Option<Implementation>>,
}

impl ServerState {
    pub fn new(config: ServerConfig, cache: Arc<ConnectionCache>) -> Self {
        let tools = create_registry(Arc::clone(&cache), config.limits);
        Self {
            config,
            cache,
            tools,
            initialized: AtomicBool::new(false),
            client_info: RwLock::new(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, client_info: Implementation) {
        *self.client_info.write() = Some(client_info);
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn client_info(&self) -> Option<Implementation> {
        self.client_info.read().clone()
    }
}

#[derive(Default)]
pub struct ServerStateBuilder {
    config: Option<ServerConfig>,
    cache: Option<Arc<ConnectionCache>>,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing cache instead of one backed by a new Trino connector.
    pub fn cache(mut self, cache: Arc<ConnectionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<ServerState> {
        let config = self.config.unwrap_or_default();

        let cache = match self.cache {
            Some(cache) => cache,
            None => {
                debug!("Creating connection cache: {:?}", config.cache);
                let connector = TrinoConnector::new(config.trino.clone())?;
                Arc::new(ConnectionCache::new(config.cache.clone(), Arc::new(connector)))
            }
        };

        Ok(ServerState::new(config, cache))
    }
}
