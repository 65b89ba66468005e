//! Driver traits: how the cache opens connections and how tools use them.

use crate::database::connection_string::ConnectionParams;
use crate::database::result::QueryResult;
use crate::error::DbResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A live session with the warehouse.
///
/// Implementation: [`TrinoConnection`](crate::database::TrinoConnection).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Runs a statement and collects at most `max_rows` rows.
    ///
    /// `catalog` and `schema` apply to this statement only and leave the
    /// session untouched, so concurrent users of one connection can each run
    /// in their own namespace. A schema without a catalog runs in the session
    /// catalog.
    ///
    /// When the cap is hit the remaining work is cancelled and the result is
    /// marked `truncated`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::StatementExecution`](crate::error::DatabaseError::StatementExecution)
    /// when the server rejects the statement and
    /// [`DatabaseError::ConnectionClosed`](crate::error::DatabaseError::ConnectionClosed)
    /// after [`close`](Connection::close).
    async fn fetch_in(
        &self,
        sql: &str,
        max_rows: Option<usize>,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> DbResult<QueryResult>;

    /// Runs a statement in the session namespace, capped at `max_rows`.
    async fn fetch(&self, sql: &str, max_rows: Option<usize>) -> DbResult<QueryResult> {
        self.fetch_in(sql, max_rows, None, None).await
    }

    /// Runs a statement and collects every row.
    async fn execute(&self, sql: &str) -> DbResult<QueryResult> {
        self.fetch(sql, None).await
    }

    /// Closes the session. Later calls to `fetch` fail.
    async fn close(&self) -> DbResult<()>;

    fn is_closed(&self) -> bool;
}

/// The "open connection" capability the cache depends on.
///
/// Implementation: [`TrinoConnector`](crate::database::TrinoConnector).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ConnectionOpen`](crate::error::DatabaseError::ConnectionOpen)
    /// if the server cannot be reached.
    async fn open(&self, params: &ConnectionParams) -> DbResult<Arc<dyn Connection>>;
}
