//! Connection health and cache statistics tools.

use crate::cache::{CacheMetricsSnapshot, CacheStats, ConnectionCache};
use crate::error::{DbResult, Result};
use crate::protocol::{CallToolResult, Tool};
use crate::tools::registry::{ToolHandler, error_payload, parse_arguments};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, instrument};

#[derive(Debug, Deserialize)]
struct JdbcArgs {
    jdbc_url: String,
}

#[derive(Debug, Serialize)]
struct ConnectionStatus {
    status: &'static str,
    version: Option<String>,
    user: Option<String>,
    catalog: Option<String>,
    schema: Option<String>,
}

/// Checks that a connection string reaches a working server.
pub struct ConnectionStatusTool {
    cache: Arc<ConnectionCache>,
}

impl ConnectionStatusTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }

    async fn probe(&self, jdbc_url: &str) -> DbResult<ConnectionStatus> {
        let lease = self.cache.acquire(jdbc_url).await?;
        let result = lease
            .execute("SELECT version(), current_user, current_catalog, current_schema")
            .await?;

        let cell = |i: usize| {
            result
                .rows
                .first()
                .and_then(|row| row.get(i))
                .and_then(crate::database::cell_to_string)
        };

        Ok(ConnectionStatus {
            status: "connected",
            version: cell(0),
            user: cell(1),
            catalog: cell(2),
            schema: cell(3),
        })
    }
}

#[async_trait]
impl ToolHandler for ConnectionStatusTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "connection_status".into(),
            description: Some(
                "Check the connection to a Trino cluster and report the server version, \
                current user, catalog and schema."
                    .into(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {
                        "type": "string",
                        "description": "Connection string: jdbc:trino://host:port?user=<user>[&password=...][&catalog=...][&schema=...]"
                    }
                },
                "required": ["jdbc_url"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "connection_status"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: JdbcArgs = parse_arguments(arguments)?;

        match self.probe(&args.jdbc_url).await {
            Ok(status) => Ok(CallToolResult::json(&status)),
            Err(e) => {
                error!("Connection test failed: {}", e);
                Ok(error_payload(e, serde_json::json!({"status": "failed"})))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct StatsReport {
    #[serde(flatten)]
    stats: CacheStats,
    metrics: CacheMetricsSnapshot,
}

/// Reports connection cache occupancy and counters.
pub struct ConnectionStatsTool {
    cache: Arc<ConnectionCache>,
}

impl ConnectionStatsTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ToolHandler for ConnectionStatsTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_connection_stats".into(),
            description: Some(
                "Show cached Trino connections: count, limits, and per-connection age and host."
                    .into(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    #[instrument(skip(self, _arguments), fields(tool = "get_connection_stats"))]
    async fn execute(&self, _arguments: Value) -> Result<CallToolResult> {
        let report = StatsReport {
            stats: self.cache.stats().await,
            metrics: self.cache.metrics().snapshot(),
        };
        Ok(CallToolResult::json(&report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::tools::testing::{URL, harness, payload, refusing, table};
    use serde_json::json;

    fn status_script(sql: &str) -> DbResult<crate::database::QueryResult> {
        match sql {
            "SELECT 1" => Ok(table(&[("_col0", "integer")], vec![vec![json!(1)]])),
            s if s.starts_with("SELECT version()") => Ok(table(
                &[
                    ("_col0", "varchar"),
                    ("_col1", "varchar"),
                    ("_col2", "varchar"),
                    ("_col3", "varchar"),
                ],
                vec![vec![json!("435"), json!("admin"), json!("hive"), Value::Null]],
            )),
            other => Err(DatabaseError::StatementExecution(format!("unexpected: {}", other))),
        }
    }

    #[tokio::test]
    async fn test_connection_status() {
        let h = harness(status_script);
        let tool = ConnectionStatusTool::new(Arc::clone(&h.cache));

        let result = tool.execute(json!({"jdbc_url": URL})).await.unwrap();
        assert!(!result.is_error());
        assert_eq!(
            payload(&result),
            json!({
                "status": "connected",
                "version": "435",
                "user": "admin",
                "catalog": "hive",
                "schema": null
            })
        );
    }

    #[tokio::test]
    async fn test_connection_status_failure() {
        let h = refusing();
        let tool = ConnectionStatusTool::new(Arc::clone(&h.cache));

        let result = tool.execute(json!({"jdbc_url": URL})).await.unwrap();
        assert!(result.is_error());
        let body = payload(&result);
        assert_eq!(body["status"], "failed");
        assert!(body["error"].as_str().unwrap().contains("Connection refused"));
    }

    #[tokio::test]
    async fn test_connection_status_bad_url() {
        let h = harness(status_script);
        let tool = ConnectionStatusTool::new(Arc::clone(&h.cache));

        let result = tool
            .execute(json!({"jdbc_url": "jdbc:mysql://localhost:3306"}))
            .await
            .unwrap();
        assert_eq!(payload(&result)["status"], "failed");
        assert_eq!(h.opens(), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_is_an_error() {
        let h = harness(status_script);
        let tool = ConnectionStatusTool::new(Arc::clone(&h.cache));
        assert!(tool.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let h = harness(status_script);
        let status = ConnectionStatusTool::new(Arc::clone(&h.cache));
        status.execute(json!({"jdbc_url": URL})).await.unwrap();
        status.execute(json!({"jdbc_url": URL})).await.unwrap();

        let tool = ConnectionStatsTool::new(Arc::clone(&h.cache));
        let body = payload(&tool.execute(Value::Null).await.unwrap());

        assert_eq!(body["active_connections"], 1);
        assert_eq!(body["max_connections"], 4);
        assert_eq!(body["connection_ttl"], 3600);
        assert_eq!(body["connections"][0]["host"], "localhost");
        assert_eq!(body["metrics"]["hits"], 1);
        assert_eq!(body["metrics"]["connections_created"], 1);
        assert!(!body.to_string().contains("user=admin"));
    }
}
