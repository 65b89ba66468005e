//! Catalog/schema selection on a leased connection.

use crate::cache::ConnectionLease;
use crate::database::QueryResult;
use crate::error::{DbResult, SecurityResult};
use crate::security::IdentifierValidator;
use tracing::debug;

/// Optional catalog and schema a tool call runs under.
#[derive(Debug, Clone, Copy, Default)]
pub struct Namespace<'a> {
    pub catalog: Option<&'a str>,
    pub schema: Option<&'a str>,
}

impl<'a> Namespace<'a> {
    pub fn new(catalog: Option<&'a str>, schema: Option<&'a str>) -> Self {
        Self {
            catalog: catalog.filter(|c| !c.is_empty()),
            schema: schema.filter(|s| !s.is_empty()),
        }
    }

    pub fn validate(&self) -> SecurityResult<()> {
        let validator = IdentifierValidator::new();
        validator.validate_optional("catalog", self.catalog)?;
        validator.validate_optional("schema", self.schema)
    }

    /// Validated dotted path: `catalog.schema.name` or `schema.name`.
    pub fn qualify(&self, name: &str) -> String {
        match (self.catalog, self.schema) {
            (Some(catalog), Some(schema)) => format!("{}.{}.{}", catalog, schema, name),
            (None, Some(schema)) => format!("{}.{}", schema, name),
            (Some(catalog), None) => format!("{}.{}", catalog, name),
            (None, None) => name.to_string(),
        }
    }

    /// Runs `sql` on `lease` in this namespace, capped at `max_rows`.
    ///
    /// The namespace travels with the statement; the shared session on the
    /// cached connection is never switched.
    pub async fn fetch(
        &self,
        lease: &ConnectionLease,
        sql: &str,
        max_rows: Option<usize>,
    ) -> DbResult<QueryResult> {
        if self.catalog.is_some() || self.schema.is_some() {
            debug!(
                "Running in {}.{}",
                self.catalog.unwrap_or("<session>"),
                self.schema.unwrap_or("<default>")
            );
        }
        lease.fetch_in(sql, max_rows, self.catalog, self.schema).await
    }

    pub async fn execute(&self, lease: &ConnectionLease, sql: &str) -> DbResult<QueryResult> {
        self.fetch(lease, sql, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{Call, URL, harness};

    #[test]
    fn test_empty_names_are_ignored() {
        let namespace = Namespace::new(Some(""), Some(""));
        assert!(namespace.catalog.is_none());
        assert!(namespace.schema.is_none());
    }

    #[tokio::test]
    async fn test_fetch_carries_namespace_without_use() {
        let h = harness(|_| Ok(QueryResult::empty()));
        let lease = h.cache.acquire(URL).await.unwrap();

        Namespace::new(Some("hive"), Some("web"))
            .execute(&lease, "SELECT * FROM logs")
            .await
            .unwrap();
        Namespace::default().execute(&lease, "SHOW CATALOGS").await.unwrap();

        assert_eq!(
            h.calls(),
            vec![
                Call::new("SELECT * FROM logs", Some("hive"), Some("web")),
                Call::new("SHOW CATALOGS", None, None),
            ]
        );
    }

    #[test]
    fn test_qualify() {
        assert_eq!(Namespace::new(Some("hive"), Some("web")).qualify("logs"), "hive.web.logs");
        assert_eq!(Namespace::new(None, Some("web")).qualify("logs"), "web.logs");
    }

    #[test]
    fn test_validate() {
        assert!(Namespace::new(Some("hive"), Some("web")).validate().is_ok());

        let err = Namespace::new(Some("hive"), Some("web;drop")).validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid schema name: web;drop");

        let err = Namespace::new(Some("1hive"), None).validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid catalog name: 1hive");
    }
}
