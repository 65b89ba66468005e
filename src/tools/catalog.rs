//! Metadata browsing: catalogs, schemas, tables and columns.

use crate::cache::ConnectionCache;
use crate::database::cell_to_string;
use crate::error::Result;
use crate::protocol::{CallToolResult, Tool};
use crate::security::IdentifierValidator;
use crate::tools::namespace::Namespace;
use crate::tools::registry::{ToolHandler, error_payload, parse_arguments};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, instrument};

const JDBC_URL_PROPERTY: &str =
    "Connection string: jdbc:trino://host:port?user=<user>[&password=...][&catalog=...][&schema=...]";

pub struct ListCatalogsTool {
    cache: Arc<ConnectionCache>,
}

impl ListCatalogsTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Deserialize)]
struct ListCatalogsArgs {
    jdbc_url: String,
}

#[async_trait]
impl ToolHandler for ListCatalogsTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_catalogs".into(),
            description: Some("List the catalogs available on the Trino cluster.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {"type": "string", "description": JDBC_URL_PROPERTY}
                },
                "required": ["jdbc_url"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "list_catalogs"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ListCatalogsArgs = parse_arguments(arguments)?;

        let outcome: Result<Vec<String>> = async {
            let lease = self.cache.acquire(&args.jdbc_url).await?;
            Ok(lease.execute("SHOW CATALOGS").await?.column_strings(0))
        }
        .await;

        match outcome {
            Ok(catalogs) => Ok(CallToolResult::json(&json!({
                "count": catalogs.len(),
                "catalogs": catalogs,
            }))),
            Err(e) => {
                error!("Error listing catalogs: {}", e);
                Ok(error_payload(e, json!({"catalogs": []})))
            }
        }
    }
}

pub struct ListSchemasTool {
    cache: Arc<ConnectionCache>,
}

impl ListSchemasTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Deserialize)]
struct ListSchemasArgs {
    jdbc_url: String,
    #[serde(default)]
    catalog: Option<String>,
}

#[async_trait]
impl ToolHandler for ListSchemasTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_schemas".into(),
            description: Some(
                "List schemas in a catalog, or in the session catalog when none is given.".into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {"type": "string", "description": JDBC_URL_PROPERTY},
                    "catalog": {"type": "string", "description": "Catalog name"}
                },
                "required": ["jdbc_url"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "list_schemas"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ListSchemasArgs = parse_arguments(arguments)?;
        let catalog = args.catalog.as_deref().filter(|c| !c.is_empty());

        let outcome: Result<Vec<String>> = async {
            IdentifierValidator::new().validate_optional("catalog", catalog)?;
            let sql = match catalog {
                Some(catalog) => format!("SHOW SCHEMAS FROM {}", catalog),
                None => "SHOW SCHEMAS".to_string(),
            };
            let lease = self.cache.acquire(&args.jdbc_url).await?;
            Ok(lease.execute(&sql).await?.column_strings(0))
        }
        .await;

        match outcome {
            Ok(schemas) => Ok(CallToolResult::json(&json!({
                "catalog": catalog,
                "schemas": schemas,
                "count": schemas.len(),
            }))),
            Err(e) => {
                error!("Error listing schemas: {}", e);
                Ok(error_payload(e, json!({"catalog": catalog, "schemas": []})))
            }
        }
    }
}

pub struct ListTablesTool {
    cache: Arc<ConnectionCache>,
}

impl ListTablesTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Deserialize)]
struct ListTablesArgs {
    jdbc_url: String,
    schema: String,
    #[serde(default)]
    catalog: Option<String>,
}

#[derive(Debug, Serialize)]
struct TableEntry {
    name: String,
    #[serde(rename = "type")]
    table_type: String,
}

#[async_trait]
impl ToolHandler for ListTablesTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_tables".into(),
            description: Some("List tables in a schema.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {"type": "string", "description": JDBC_URL_PROPERTY},
                    "schema": {"type": "string", "description": "Schema name"},
                    "catalog": {"type": "string", "description": "Catalog name (defaults to the session catalog)"}
                },
                "required": ["jdbc_url", "schema"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "list_tables"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ListTablesArgs = parse_arguments(arguments)?;
        let namespace = Namespace::new(args.catalog.as_deref(), Some(&args.schema));

        let outcome: Result<Vec<TableEntry>> = async {
            IdentifierValidator::new().validate("schema", &args.schema)?;
            namespace.validate()?;

            let sql = match namespace.catalog {
                Some(catalog) => format!("SHOW TABLES FROM {}.{}", catalog, args.schema),
                None => format!("SHOW TABLES FROM {}", args.schema),
            };
            let lease = self.cache.acquire(&args.jdbc_url).await?;
            let result = lease.execute(&sql).await?;

            Ok(result
                .rows
                .iter()
                .filter_map(|row| {
                    let name = row.first().and_then(cell_to_string)?;
                    let table_type = row
                        .get(1)
                        .and_then(cell_to_string)
                        .unwrap_or_else(|| "TABLE".to_string());
                    Some(TableEntry { name, table_type })
                })
                .collect())
        }
        .await;

        match outcome {
            Ok(tables) => Ok(CallToolResult::json(&json!({
                "catalog": namespace.catalog,
                "schema": args.schema,
                "count": tables.len(),
                "tables": tables,
            }))),
            Err(e) => {
                error!("Error listing tables: {}", e);
                Ok(error_payload(
                    e,
                    json!({"catalog": namespace.catalog, "schema": args.schema, "tables": []}),
                ))
            }
        }
    }
}

pub struct DescribeTableTool {
    cache: Arc<ConnectionCache>,
}

impl DescribeTableTool {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Deserialize)]
struct DescribeTableArgs {
    jdbc_url: String,
    table: String,
    schema: String,
    #[serde(default)]
    catalog: Option<String>,
}

/// One row of `DESCRIBE`: Column, Type, Extra, Comment.
#[derive(Debug, Serialize)]
struct ColumnEntry {
    name: String,
    #[serde(rename = "type")]
    data_type: Option<String>,
    extra: Option<String>,
    comment: Option<String>,
}

#[async_trait]
impl ToolHandler for DescribeTableTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "describe_table".into(),
            description: Some("Describe the columns of a table.".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "jdbc_url": {"type": "string", "description": JDBC_URL_PROPERTY},
                    "table": {"type": "string", "description": "Table name"},
                    "schema": {"type": "string", "description": "Schema name"},
                    "catalog": {"type": "string", "description": "Catalog name (defaults to the session catalog)"}
                },
                "required": ["jdbc_url", "table", "schema"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "describe_table"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: DescribeTableArgs = parse_arguments(arguments)?;
        let namespace = Namespace::new(args.catalog.as_deref(), Some(&args.schema));

        let outcome: Result<Vec<ColumnEntry>> = async {
            let validator = IdentifierValidator::new();
            validator.validate("table", &args.table)?;
            validator.validate("schema", &args.schema)?;
            namespace.validate()?;

            let path = namespace.qualify(&args.table);
            debug!("Describing {}", path);
            let lease = self.cache.acquire(&args.jdbc_url).await?;
            let result = lease.execute(&format!("DESCRIBE {}", path)).await?;

            Ok(result
                .rows
                .iter()
                .filter_map(|row| {
                    let cell = |i: usize| row.get(i).and_then(cell_to_string);
                    Some(ColumnEntry {
                        name: cell(0)?,
                        data_type: cell(1),
                        extra: cell(2).filter(|s| !s.is_empty()),
                        comment: cell(3).filter(|s| !s.is_empty()),
                    })
                })
                .collect())
        }
        .await;

        match outcome {
            Ok(columns) => Ok(CallToolResult::json(&json!({
                "catalog": namespace.catalog,
                "schema": args.schema,
                "table": args.table,
                "column_count": columns.len(),
                "columns": columns,
            }))),
            Err(e) => {
                error!("Error describing table {}: {}", args.table, e);
                Ok(error_payload(
                    e,
                    json!({
                        "catalog": namespace.catalog,
                        "schema": args.schema,
                        "table": args.table,
                        "columns": []
                    }),
                ))
            }
        }
    }
}
