//! Configuration types and builders.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Connection cache limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_connections: usize,
    pub connection_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new(max_connections: usize, connection_ttl: Duration) -> Self {
        Self {
            max_connections,
            connection_ttl,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections".into(),
                message: "Cache capacity must be greater than 0".into(),
            }
            .into());
        }
        if self.connection_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "connection_ttl".into(),
                message: "Connection TTL must be greater than 0".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// Trino HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrinoConfig {
    /// Value of the `X-Trino-Source` header.
    pub source: String,
    pub request_timeout: Duration,
    /// Retries on 502/503/504 before a request is reported as failed.
    pub max_retries: u32,
}

impl Default for TrinoConfig {
    fn default() -> Self {
        Self {
            source: "trino-mcp".into(),
            request_timeout: Duration::from_secs(300),
            max_retries: 3,
        }
    }
}

/// Row limits for `execute_query`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueryLimits {
    pub default_rows: usize,
    pub max_rows: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_rows: 100,
            max_rows: 1000,
        }
    }
}

impl QueryLimits {
    /// Resolve a requested limit against the default and the hard cap.
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_rows)
            .clamp(1, self.max_rows.max(1))
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub cache: CacheConfig,
    pub trino: TrinoConfig,
    pub limits: QueryLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "trino-mcp".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            cache: CacheConfig::default(),
            trino: TrinoConfig::default(),
            limits: QueryLimits::default(),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig with fluent API.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.cache.max_connections = max;
        self
    }

    pub fn connection_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.connection_ttl = ttl;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.trino.request_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.trino.max_retries = retries;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.config.trino.source = source.into();
        self
    }

    pub fn limits(mut self, limits: QueryLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Override settings from environment variables.
    pub fn from_env(mut self) -> Result<Self> {
        if let Ok(name) = env::var("APP_NAME") {
            self.config.name = name.into();
        }

        if let Some(max) = parse_env::<usize>("TRINO_MCP_MAX_CONNECTIONS")? {
            self.config.cache.max_connections = max;
        }

        if let Some(ttl) = parse_env::<u64>("TRINO_MCP_CONNECTION_TTL")? {
            self.config.cache.connection_ttl = Duration::from_secs(ttl);
        }

        if let Some(timeout) = parse_env::<u64>("TRINO_MCP_REQUEST_TIMEOUT")? {
            self.config.trino.request_timeout = Duration::from_secs(timeout);
        }

        if let Some(retries) = parse_env::<u32>("TRINO_MCP_MAX_RETRIES")? {
            self.config.trino.max_retries = retries;
        }

        if let Ok(source) = env::var("TRINO_MCP_SOURCE") {
            self.config.trino.source = source;
        }

        if let Some(rows) = parse_env::<usize>("TRINO_MCP_DEFAULT_ROW_LIMIT")? {
            self.config.limits.default_rows = rows;
        }

        if let Some(rows) = parse_env::<usize>("TRINO_MCP_MAX_ROW_LIMIT")? {
            self.config.limits.max_rows = rows;
        }

        Ok(self)
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<()> {
        if self.config.name.is_empty() {
            return Err(ConfigError::MissingField("name".into()).into());
        }
        self.config.cache.validate()?;
        if self.config.limits.max_rows == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_rows".into(),
                message: "Row limit must be greater than 0".into(),
            }
            .into());
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(var: &'static str) -> Result<Option<T>> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::InvalidValue {
                field: var.into(),
                message: format!("Cannot parse '{}'", raw).into(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.cache.max_connections, 10);
        assert_eq!(config.cache.connection_ttl, Duration::from_secs(3600));
        assert_eq!(config.limits.default_rows, 100);
        assert_eq!(config.limits.max_rows, 1000);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .name("warehouse")
            .max_connections(3)
            .connection_ttl(Duration::from_secs(60))
            .source("tests")
            .build()
            .unwrap();

        assert_eq!(config.name, "warehouse");
        assert_eq!(config.cache.max_connections, 3);
        assert_eq!(config.cache.connection_ttl, Duration::from_secs(60));
        assert_eq!(config.trino.source, "tests");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ServerConfig::builder().max_connections(0).build().is_err());
        assert!(
            ServerConfig::builder()
                .connection_ttl(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_limit_clamp() {
        let limits = QueryLimits::default();
        assert_eq!(limits.clamp(None), 100);
        assert_eq!(limits.clamp(Some(5000)), 1000);
        assert_eq!(limits.clamp(Some(0)), 1);
        assert_eq!(limits.clamp(Some(42)), 42);
    }
}
