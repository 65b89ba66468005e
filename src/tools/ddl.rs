//! DDL validation and batch execution.

use crate::cache::ConnectionCache;
use crate::ddl::{DdlAnalyzer, DdlReport, DdlType, preview};
use crate::error::Result;
use crate::protocol::{CallToolResult, Tool};
use crate::security::trim_statement;
use crate::tools::namespace::Namespace;
use crate::tools::registry::{ToolHandler, error_payload, parse_arguments};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct ValidateDdlArgs {
    ddl_list: Vec<String>,
}

/// Static analysis of DDL statements; never touches a connection.
pub struct ValidateDdlTool;

#[async_trait]
impl ToolHandler for ValidateDdlTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "validate_ddl_statements".into(),
            description: Some(
                "Analyze DDL statements without running them: types, object names, \
                dependencies, columns and potential issues."
                    .into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ddl_list": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "DDL statements to analyze"
                    }
                },
                "required": ["ddl_list"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "validate_ddl_statements"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ValidateDdlArgs = parse_arguments(arguments)?;
        let report = DdlAnalyzer::analyze(&args.ddl_list);
        info!(
            "Analyzed {} statements, {} issues",
            report.total_statements,
            report.potential_issues.len()
        );
        Ok(CallToolResult::json(&report))
    }
}

pub struct ExecuteDdlTool {
    cache: Arc<ConnectionCache>,
}

impl ExecuteDdlTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }
}

fn default_validate_first() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ExecuteDdlArgs {
    jdbc_url: String,
    ddl_list: Vec<String>,
    #[serde(default)]
    catalog: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default = "default_validate_first")]
    validate_first: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Outcome {
    Success {
        ddl_type: DdlType,
        object_name: Option<String>,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct StatementResult {
    index: usize,
    #[serde(flatten)]
    outcome: Outcome,
    ddl_preview: String,
}

#[derive(Debug, Serialize)]
struct ExecutionReport {
    total_statements: usize,
    validation: Option<DdlReport>,
    execution_results: Vec<StatementResult>,
    success_count: usize,
    error_count: usize,
}

#[async_trait]
impl ToolHandler for ExecuteDdlTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "execute_ddl_statements".into(),
            description: Some(
                "Execute DDL statements in order. By default they are validated first and \
                nothing runs if a high-severity issue (such as DROP TABLE) is found."
                    .into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {"type": "string", "description": "Connection string: jdbc:trino://host:port?user=<user>[&...]"},
                    "ddl_list": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "DDL statements to execute in order"
                    },
                    "catalog": {"type": "string", "description": "Catalog to run in"},
                    "schema": {"type": "string", "description": "Schema to run in"},
                    "validate_first": {
                        "type": "boolean",
                        "description": "Analyze before executing and stop on critical issues",
                        "default": true
                    }
                },
                "required": ["jdbc_url", "ddl_list"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "execute_ddl_statements"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ExecuteDdlArgs = parse_arguments(arguments)?;
        let total = args.ddl_list.len();

        let validation = args
            .validate_first
            .then(|| DdlAnalyzer::analyze(&args.ddl_list));

        if let Some(report) = &validation {
            let critical = report.critical_issues();
            if !critical.is_empty() {
                warn!("Refusing to execute DDL: {} critical issues", critical.len());
                return Ok(CallToolResult::json_error(&json!({
                    "total_statements": total,
                    "validation": report,
                    "execution_results": [],
                    "success_count": 0,
                    "error_count": 0,
                    "error": "Critical issues found in DDL; execution stopped.",
                    "critical_issues": critical,
                })));
            }
        }

        let namespace = Namespace::new(args.catalog.as_deref(), args.schema.as_deref());

        let outcome: Result<Vec<StatementResult>> = async {
            namespace.validate()?;
            let lease = self.cache.acquire(&args.jdbc_url).await?;

            let mut results = Vec::with_capacity(total);
            for (index, raw) in args.ddl_list.iter().enumerate() {
                let ddl = trim_statement(raw);
                if ddl.is_empty() {
                    continue;
                }
                let outcome = match namespace.execute(&lease, ddl).await {
                    Ok(_) => Outcome::Success {
                        ddl_type: DdlAnalyzer::classify(ddl),
                        object_name: DdlAnalyzer::extract_object_name(ddl),
                    },
                    Err(e) => {
                        warn!("DDL statement {} failed: {}", index, e);
                        Outcome::Error {
                            error: e.to_string(),
                        }
                    }
                };
                results.push(StatementResult {
                    index,
                    outcome,
                    ddl_preview: preview(ddl),
                });
            }
            Ok(results)
        }
        .await;

        match outcome {
            Ok(execution_results) => {
                let success_count = execution_results
                    .iter()
                    .filter(|r| matches!(r.outcome, Outcome::Success { .. }))
                    .count();
                let error_count = execution_results.len() - success_count;
                info!(
                    "Executed DDL batch: {} succeeded, {} failed",
                    success_count, error_count
                );
                Ok(CallToolResult::json(&ExecutionReport {
                    total_statements: total,
                    validation,
                    execution_results,
                    success_count,
                    error_count,
                }))
            }
            Err(e) => {
                error!("Error executing DDL: {}", e);
                Ok(error_payload(e, json!({"total_statements": total})))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryResult;
    use crate::error::{DatabaseError, DbResult};
    use crate::tools::testing::{Call, URL, harness, payload};

    fn script(sql: &str) -> DbResult<QueryResult> {
        if sql.contains("broken") {
            Err(DatabaseError::StatementExecution(
                "SYNTAX_ERROR: line 1:14: mismatched input 'broken'".into(),
            ))
        } else {
            Ok(QueryResult::empty())
        }
    }

    #[tokio::test]
    async fn test_validate_ddl_returns_report() {
        let body = payload(
            &ValidateDdlTool
                .execute(json!({"ddl_list": [
                    "CREATE TABLE IF NOT EXISTS users (id INT PRIMARY KEY, name VARCHAR(50))",
                    "DROP TABLE users"
                ]}))
                .await
                .unwrap(),
        );

        assert_eq!(body["total_statements"], 2);
        assert_eq!(body["by_type"]["CREATE_TABLE"], 1);
        assert_eq!(body["by_type"]["DROP_TABLE"], 1);
        assert_eq!(body["objects"][0]["columns"][1]["size"], "50");
        assert!(
            body["potential_issues"]
                .as_array()
                .unwrap()
                .iter()
                .any(|i| i["type"] == "destructive_operation" && i["severity"] == "high")
        );
    }

    #[tokio::test]
    async fn test_execute_ddl_runs_in_order() {
        let h = harness(script);
        let tool = ExecuteDdlTool::new(Arc::clone(&h.cache));

        let body = payload(
            &tool
                .execute(json!({
                    "jdbc_url": URL,
                    "catalog": "hive",
                    "schema": "web",
                    "ddl_list": [
                        "CREATE TABLE IF NOT EXISTS logs (id BIGINT);",
                        "   ",
                        "CREATE VIEW IF NOT EXISTS recent AS SELECT * FROM logs"
                    ]
                }))
                .await
                .unwrap(),
        );

        assert_eq!(body["total_statements"], 3);
        assert_eq!(body["success_count"], 2);
        assert_eq!(body["error_count"], 0);
        assert_eq!(body["validation"]["total_statements"], 3);
        assert_eq!(
            body["execution_results"][0],
            json!({
                "index": 0,
                "status": "success",
                "ddl_type": "CREATE_TABLE",
                "object_name": "logs",
                "ddl_preview": "CREATE TABLE IF NOT EXISTS logs (id BIGINT)"
            })
        );
        assert_eq!(body["execution_results"][1]["index"], 2);
        assert_eq!(
            h.calls(),
            vec![
                Call::new("CREATE TABLE IF NOT EXISTS logs (id BIGINT)", Some("hive"), Some("web")),
                Call::new(
                    "CREATE VIEW IF NOT EXISTS recent AS SELECT * FROM logs",
                    Some("hive"),
                    Some("web")
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_ddl_stops_on_critical_issues() {
        let h = harness(script);
        let tool = ExecuteDdlTool::new(Arc::clone(&h.cache));

        let result = tool
            .execute(json!({
                "jdbc_url": URL,
                "ddl_list": ["CREATE TABLE IF NOT EXISTS a (id INT)", "DROP TABLE IF EXISTS b"]
            }))
            .await
            .unwrap();

        assert!(result.is_error());
        let body = payload(&result);
        assert_eq!(body["error"], "Critical issues found in DDL; execution stopped.");
        assert_eq!(body["critical_issues"][0]["type"], "destructive_operation");
        assert_eq!(body["critical_issues"][0]["statement_index"], 1);
        assert_eq!(h.opens(), 0);
    }

    #[tokio::test]
    async fn test_execute_ddl_without_validation() {
        let h = harness(script);
        let tool = ExecuteDdlTool::new(Arc::clone(&h.cache));

        let body = payload(
            &tool
                .execute(json!({
                    "jdbc_url": URL,
                    "validate_first": false,
                    "ddl_list": ["DROP TABLE IF EXISTS old_logs", "CREATE TABLE broken"]
                }))
                .await
                .unwrap(),
        );

        assert_eq!(body["validation"], Value::Null);
        assert_eq!(body["success_count"], 1);
        assert_eq!(body["error_count"], 1);
        assert_eq!(body["execution_results"][0]["ddl_type"], "DROP_TABLE");
        assert_eq!(body["execution_results"][1]["status"], "error");
        assert!(
            body["execution_results"][1]["error"]
                .as_str()
                .unwrap()
                .contains("SYNTAX_ERROR")
        );
    }

    #[tokio::test]
    async fn test_execute_ddl_rejects_bad_catalog() {
        let h = harness(script);
        let tool = ExecuteDdlTool::new(Arc::clone(&h.cache));

        let result = tool
            .execute(json!({
                "jdbc_url": URL,
                "catalog": "hive.web",
                "ddl_list": ["CREATE SCHEMA IF NOT EXISTS s"]
            }))
            .await
            .unwrap();

        assert!(result.is_error());
        assert_eq!(payload(&result)["total_statements"], 1);
        assert_eq!(h.opens(), 0);
    }
}
