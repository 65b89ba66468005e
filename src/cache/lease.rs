//! Scoped access to a cached connection.

use crate::cache::metrics::CacheMetrics;
use crate::database::{Connection, ConnectionKey, QueryResult};
use crate::error::DbResult;
use std::ops::Deref;
use std::sync::Arc;
use tracing::trace;

/// A connection handed out by [`ConnectionCache::acquire`](super::ConnectionCache::acquire).
///
/// Dropping the lease ends the caller's use of the connection. It does not
/// close it; the connection stays cached until it expires, is evicted or the
/// cache is released.
pub struct ConnectionLease {
    key: ConnectionKey,
    connection: Arc<dyn Connection>,
    metrics: Arc<CacheMetrics>,
}

impl ConnectionLease {
    pub(crate) fn new(
        key: ConnectionKey,
        connection: Arc<dyn Connection>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        metrics.lease_acquired();
        Self {
            key,
            connection,
            metrics,
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Shared handle to the underlying connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Runs a statement under an optional catalog and schema, capped at
    /// `max_rows`, and records it in the cache metrics.
    pub async fn fetch_in(
        &self,
        sql: &str,
        max_rows: Option<usize>,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> DbResult<QueryResult> {
        let result = self.connection.fetch_in(sql, max_rows, catalog, schema).await;
        match &result {
            Ok(_) => self.metrics.record_query_executed(),
            Err(_) => self.metrics.record_query_error(),
        }
        result
    }

    /// Runs a statement, capped at `max_rows`, and records it in the cache metrics.
    pub async fn fetch(&self, sql: &str, max_rows: Option<usize>) -> DbResult<QueryResult> {
        self.fetch_in(sql, max_rows, None, None).await
    }

    /// Runs a statement and records it in the cache metrics.
    pub async fn execute(&self, sql: &str) -> DbResult<QueryResult> {
        self.fetch(sql, None).await
    }
}

impl Deref for ConnectionLease {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.metrics.lease_released();
        trace!("Released lease on {}", self.key.redacted());
    }
}
