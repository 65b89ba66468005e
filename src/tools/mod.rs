//! MCP tool definitions and registry.

pub mod catalog;
pub mod connection;
pub mod ddl;
pub mod namespace;
pub mod query;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{DescribeTableTool, ListCatalogsTool, ListSchemasTool, ListTablesTool};
pub use connection::{ConnectionStatsTool, ConnectionStatusTool};
pub use ddl::{ExecuteDdlTool, ValidateDdlTool};
pub use namespace::Namespace;
pub use query::{AnalyzeQueriesTool, ExecuteQueryTool};
pub use registry::{ToolHandler, ToolRegistry, error_payload, parse_arguments};

use crate::cache::ConnectionCache;
use crate::config::QueryLimits;
use std::sync::Arc;

/// Create and register all tools.
pub fn create_registry(cache: Arc<ConnectionCache>, limits: QueryLimits) -> ToolRegistry {
    let registry = ToolRegistry::new();

    registry.register(ConnectionStatusTool::new(Arc::clone(&cache)));
    registry.register(ConnectionStatsTool::new(Arc::clone(&cache)));

    // Metadata
    registry.register(ListCatalogsTool::new(Arc::clone(&cache)));
    registry.register(ListSchemasTool::new(Arc::clone(&cache)));
    registry.register(ListTablesTool::new(Arc::clone(&cache)));
    registry.register(DescribeTableTool::new(Arc::clone(&cache)));

    registry.register(ExecuteQueryTool::new(Arc::clone(&cache), limits));
    registry.register(AnalyzeQueriesTool::new(Arc::clone(&cache)));

    // DDL
    registry.register(ValidateDdlTool);
    registry.register(ExecuteDdlTool::new(cache));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::refusing;

    #[test]
    fn test_create_registry() {
        let registry = create_registry(Arc::clone(&refusing().cache), QueryLimits::default());

        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "analyze_queries",
                "connection_status",
                "describe_table",
                "execute_ddl_statements",
                "execute_query",
                "get_connection_stats",
                "list_catalogs",
                "list_schemas",
                "list_tables",
                "validate_ddl_statements",
            ]
        );
    }

    #[test]
    fn test_tool_schemas_are_objects() {
        let registry = create_registry(Arc::clone(&refusing().cache), QueryLimits::default());
        for tool in registry.list() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.description.is_some(), "{}", tool.name);
        }
    }
}
