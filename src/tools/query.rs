//! Query execution and `EXPLAIN`-based validation.

use crate::cache::ConnectionCache;
use crate::config::QueryLimits;
use crate::error::{Result, ToolError};
use crate::protocol::{CallToolResult, Tool};
use crate::security::trim_statement;
use crate::tools::namespace::Namespace;
use crate::tools::registry::{ToolHandler, error_payload, parse_arguments};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct ExecuteQueryTool {
    cache: Arc<ConnectionCache>,
    limits: QueryLimits,
}

impl ExecuteQueryTool {
    pub fn new(cache: Arc<ConnectionCache>, limits: QueryLimits) -> Self {
        Self { cache, limits }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteQueryArgs {
    jdbc_url: String,
    sql: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    catalog: Option<String>,
    #[serde(default)]
    schema: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryPayload<'a> {
    sql: &'a str,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    row_count: usize,
    /// The row limit cut the result short.
    limited: bool,
    catalog: Option<&'a str>,
    schema: Option<&'a str>,
}

#[async_trait]
impl ToolHandler for ExecuteQueryTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "execute_query".into(),
            description: Some(format!(
                "Execute a SQL query and return up to `limit` rows (default {}, max {}).",
                self.limits.default_rows, self.limits.max_rows
            )),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {"type": "string", "description": "Connection string: jdbc:trino://host:port?user=<user>[&...]"},
                    "sql": {"type": "string", "description": "SQL statement to run"},
                    "limit": {
                        "type": "integer",
                        "description": "Maximum rows to return",
                        "default": self.limits.default_rows,
                        "minimum": 1,
                        "maximum": self.limits.max_rows
                    },
                    "catalog": {"type": "string", "description": "Catalog to run in"},
                    "schema": {"type": "string", "description": "Schema to run in"}
                },
                "required": ["jdbc_url", "sql"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "execute_query"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ExecuteQueryArgs = parse_arguments(arguments)?;
        let sql = trim_statement(&args.sql);
        if sql.is_empty() {
            return Err(ToolError::MissingArgument("sql".into()).into());
        }
        let namespace = Namespace::new(args.catalog.as_deref(), args.schema.as_deref());
        let limit = self.limits.clamp(args.limit);

        let outcome: Result<_> = async {
            namespace.validate()?;
            let lease = self.cache.acquire(&args.jdbc_url).await?;
            Ok(namespace.fetch(&lease, sql, Some(limit)).await?)
        }
        .await;

        match outcome {
            Ok(result) => {
                debug!(
                    "Query returned {} rows in {}ms",
                    result.row_count, result.execution_time_ms
                );
                let limited = result.truncated || result.row_count >= limit;
                Ok(CallToolResult::json(&QueryPayload {
                    sql,
                    columns: result.column_names(),
                    row_count: result.row_count,
                    rows: result.rows,
                    limited,
                    catalog: namespace.catalog,
                    schema: namespace.schema,
                }))
            }
            Err(e) => {
                error!("Error executing query: {}", e);
                Ok(error_payload(e, json!({"sql": sql})))
            }
        }
    }
}

pub struct AnalyzeQueriesTool {
    cache: Arc<ConnectionCache>,
}

impl AnalyzeQueriesTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeQueriesArgs {
    jdbc_url: String,
    queries: Vec<String>,
    #[serde(default)]
    catalog: Option<String>,
    #[serde(default)]
    schema: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Verdict {
    Valid { plan: Vec<String> },
    Invalid { error: String },
}

#[derive(Debug, Serialize)]
struct QueryAnalysis {
    query_index: usize,
    sql: String,
    #[serde(flatten)]
    verdict: Verdict,
}

impl QueryAnalysis {
    fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Valid { .. })
    }
}

#[async_trait]
impl ToolHandler for AnalyzeQueriesTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "analyze_queries".into(),
            description: Some(
                "Validate queries with EXPLAIN and return each query's plan or error.".into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {"type": "string", "description": "Connection string: jdbc:trino://host:port?user=<user>[&...]"},
                    "queries": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Queries to explain"
                    },
                    "catalog": {"type": "string", "description": "Catalog to run in"},
                    "schema": {"type": "string", "description": "Schema to run in"}
                },
                "required": ["jdbc_url", "queries"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "analyze_queries"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: AnalyzeQueriesArgs = parse_arguments(arguments)?;
        let namespace = Namespace::new(args.catalog.as_deref(), args.schema.as_deref());
        let total = args.queries.len();

        let outcome: Result<Vec<QueryAnalysis>> = async {
            namespace.validate()?;
            let lease = self.cache.acquire(&args.jdbc_url).await?;

            let mut results = Vec::with_capacity(total);
            for (query_index, query) in args.queries.iter().enumerate() {
                let sql = trim_statement(query);
                let verdict = match namespace
                    .execute(&lease, &format!("EXPLAIN {}", sql))
                    .await {
                    Ok(plan) => Verdict::Valid {
                        plan: plan.column_strings(0),
                    },
                    Err(e) => {
                        warn!("Query {} failed EXPLAIN: {}", query_index, e);
                        Verdict::Invalid {
                            error: e.to_string(),
                        }
                    }
                };
                results.push(QueryAnalysis {
                    query_index,
                    sql: sql.to_string(),
                    verdict,
                });
            }
            Ok(results)
        }
        .await;

        match outcome {
            Ok(results) => {
                let valid = results.iter().filter(|r| r.is_valid()).count();
                info!("Analyzed {} queries, {} valid", total, valid);
                Ok(CallToolResult::json(&json!({
                    "total_queries": total,
                    "valid_queries": valid,
                    "invalid_queries": total - valid,
                    "results": results,
                })))
            }
            Err(e) => {
                error!("Error analyzing queries: {}", e);
                Ok(error_payload(e, json!({"total_queries": total})))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryResult;
    use crate::error::{DatabaseError, DbResult};
    use crate::tools::testing::{Call, URL, harness, payload, refusing, strings, table};

    fn numbers(n: i64) -> QueryResult {
        table(
            &[("n", "bigint"), ("label", "varchar")],
            (0..n).map(|i| vec![json!(i), json!(format!("row {}", i))]).collect(),
        )
    }

    fn script(sql: &str) -> DbResult<QueryResult> {
        match sql {
            "SELECT 1" => Ok(numbers(1)),
            "SELECT * FROM nation" => Ok(numbers(25)),
            "EXPLAIN SELECT * FROM nation" => Ok(strings(
                "Query Plan",
                &["Fragment 0 [SINGLE]", "    TableScan[nation]"],
            )),
            s if s.starts_with("EXPLAIN") => Err(DatabaseError::StatementExecution(
                "SYNTAX_ERROR: line 1:8: mismatched input".into(),
            )),
            other => Err(DatabaseError::StatementExecution(format!(
                "TABLE_NOT_FOUND: {}",
                other
            ))),
        }
    }

    fn tool(h: &crate::tools::testing::Harness) -> ExecuteQueryTool {
        ExecuteQueryTool::new(
            Arc::clone(&h.cache),
            QueryLimits {
                default_rows: 10,
                max_rows: 20,
            },
        )
    }

    #[tokio::test]
    async fn test_execute_query_default_limit() {
        let h = harness(script);
        let body = payload(
            &tool(&h)
                .execute(json!({"jdbc_url": URL, "sql": "SELECT * FROM nation;"}))
                .await
                .unwrap(),
        );

        assert_eq!(body["sql"], "SELECT * FROM nation");
        assert_eq!(body["columns"], json!(["n", "label"]));
        assert_eq!(body["row_count"], 10);
        assert_eq!(body["limited"], true);
        assert_eq!(body["rows"][9], json!([9, "row 9"]));
    }

    #[tokio::test]
    async fn test_execute_query_limit_is_capped() {
        let h = harness(script);
        let body = payload(
            &tool(&h)
                .execute(json!({"jdbc_url": URL, "sql": "SELECT * FROM nation", "limit": 500}))
                .await
                .unwrap(),
        );
        assert_eq!(body["row_count"], 20);
    }

    #[tokio::test]
    async fn test_execute_query_under_limit() {
        let h = harness(script);
        let body = payload(
            &tool(&h)
                .execute(json!({"jdbc_url": URL, "sql": "SELECT 1", "limit": 5}))
                .await
                .unwrap(),
        );
        assert_eq!(body["row_count"], 1);
        assert_eq!(body["limited"], false);
    }

    #[tokio::test]
    async fn test_execute_query_runs_in_namespace() {
        let h = harness(script);
        let body = payload(
            &tool(&h)
                .execute(json!({
                    "jdbc_url": URL,
                    "sql": "SELECT * FROM nation",
                    "catalog": "tpch",
                    "schema": "tiny"
                }))
                .await
                .unwrap(),
        );

        assert_eq!(body["catalog"], "tpch");
        assert_eq!(body["schema"], "tiny");
        assert_eq!(
            h.calls(),
            vec![Call::new("SELECT * FROM nation", Some("tpch"), Some("tiny"))]
        );
    }

    #[tokio::test]
    async fn test_overlapping_calls_keep_their_own_schema() {
        let h = harness(script);
        let url = format!("{}&catalog=hive", URL);
        let tool = tool(&h);

        let (a, b) = tokio::join!(
            tool.execute(json!({"jdbc_url": url, "sql": "SELECT * FROM nation", "schema": "a"})),
            tool.execute(json!({"jdbc_url": url, "sql": "SELECT * FROM nation", "schema": "b"})),
        );
        assert!(!a.unwrap().is_error());
        assert!(!b.unwrap().is_error());

        let calls = h.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&Call::new("SELECT * FROM nation", Some("hive"), Some("a"))));
        assert!(calls.contains(&Call::new("SELECT * FROM nation", Some("hive"), Some("b"))));
        assert_eq!(h.opens(), 1);
    }

    #[tokio::test]
    async fn test_execute_query_error_payload() {
        let h = harness(script);
        let result = tool(&h)
            .execute(json!({"jdbc_url": URL, "sql": "SELECT * FROM missing"}))
            .await
            .unwrap();

        assert!(result.is_error());
        let body = payload(&result);
        assert_eq!(body["sql"], "SELECT * FROM missing");
        assert!(body["error"].as_str().unwrap().contains("TABLE_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_execute_query_rejects_bad_schema() {
        let h = harness(script);
        let result = tool(&h)
            .execute(json!({"jdbc_url": URL, "sql": "SELECT 1", "schema": "x y"}))
            .await
            .unwrap();
        assert!(result.is_error());
        assert_eq!(h.opens(), 0);
    }

    #[tokio::test]
    async fn test_execute_query_requires_sql() {
        let h = harness(script);
        assert!(tool(&h).execute(json!({"jdbc_url": URL, "sql": " ; "})).await.is_err());
    }

    #[tokio::test]
    async fn test_analyze_queries() {
        let h = harness(script);
        let tool = AnalyzeQueriesTool::new(Arc::clone(&h.cache));

        let body = payload(
            &tool
                .execute(json!({
                    "jdbc_url": URL,
                    "queries": ["SELECT * FROM nation", "SELEC oops"]
                }))
                .await
                .unwrap(),
        );

        assert_eq!(body["total_queries"], 2);
        assert_eq!(body["valid_queries"], 1);
        assert_eq!(body["invalid_queries"], 1);
        assert_eq!(
            body["results"][0],
            json!({
                "query_index": 0,
                "sql": "SELECT * FROM nation",
                "status": "valid",
                "plan": ["Fragment 0 [SINGLE]", "    TableScan[nation]"]
            })
        );
        assert_eq!(body["results"][1]["status"], "invalid");
        assert!(body["results"][1]["error"].as_str().unwrap().contains("SYNTAX_ERROR"));
        assert_eq!(h.opens(), 1);
    }

    #[tokio::test]
    async fn test_analyze_queries_connection_failure() {
        let h = refusing();
        let tool = AnalyzeQueriesTool::new(Arc::clone(&h.cache));

        let result = tool
            .execute(json!({"jdbc_url": URL, "queries": ["SELECT 1"]}))
            .await
            .unwrap();
        assert!(result.is_error());
        assert_eq!(payload(&result)["total_queries"], 1);
    }
}
