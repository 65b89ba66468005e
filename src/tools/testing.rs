//! Scripted cache fixtures for tool tests.

use crate::cache::ConnectionCache;
use crate::config::CacheConfig;
use crate::database::{Column, Connection, ConnectionParams, Connector, QueryResult};
use crate::error::{DatabaseError, DbResult};
use crate::protocol::CallToolResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const URL: &str = "jdbc:trino://localhost:8080?user=admin";

type Script = dyn Fn(&str) -> DbResult<QueryResult> + Send + Sync;

/// A statement as the server saw it, with the namespace it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub sql: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

impl Call {
    pub fn new(sql: &str, catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self {
            sql: sql.to_string(),
            catalog: catalog.map(str::to_string),
            schema: schema.map(str::to_string),
        }
    }
}

/// Connection with a server-side session: `USE` switches it for every
/// later statement, a per-statement namespace overrides it for one.
struct ScriptedConnection {
    script: Arc<Script>,
    log: Arc<Mutex<Vec<Call>>>,
    session: Mutex<(Option<String>, Option<String>)>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn fetch_in(
        &self,
        sql: &str,
        max_rows: Option<usize>,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> DbResult<QueryResult> {
        // Let overlapping callers interleave between statements.
        tokio::task::yield_now().await;

        if let Some(target) = sql.strip_prefix("USE ") {
            let mut session = self.session.lock();
            *session = match target.split_once('.') {
                Some((c, s)) => (Some(c.to_string()), Some(s.to_string())),
                None => (session.0.clone(), Some(target.to_string())),
            };
        }

        let call = {
            let session = self.session.lock();
            match (catalog, schema) {
                (Some(c), s) => Call::new(sql, Some(c), s),
                (None, Some(s)) => Call::new(sql, session.0.as_deref(), Some(s)),
                (None, None) => Call::new(sql, session.0.as_deref(), session.1.as_deref()),
            }
        };
        self.log.lock().push(call);

        let mut result = (self.script)(sql)?;
        if let Some(max) = max_rows
            && result.rows.len() > max
        {
            result.rows.truncate(max);
            result.row_count = max;
            result.truncated = true;
        }
        Ok(result)
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

struct ScriptedConnector {
    script: Arc<Script>,
    log: Arc<Mutex<Vec<Call>>>,
    opens: Arc<AtomicUsize>,
    refuse: bool,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, params: &ConnectionParams) -> DbResult<Arc<dyn Connection>> {
        if self.refuse {
            return Err(DatabaseError::ConnectionOpen(format!(
                "Connection refused: {}:{}",
                params.host, params.port
            )));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedConnection {
            script: Arc::clone(&self.script),
            log: Arc::clone(&self.log),
            session: Mutex::new((
                params.catalog().map(str::to_string),
                params.schema().map(str::to_string),
            )),
        }))
    }
}

pub struct Harness {
    pub cache: Arc<ConnectionCache>,
    log: Arc<Mutex<Vec<Call>>>,
    opens: Arc<AtomicUsize>,
}

impl Harness {
    /// Statements run so far with their namespaces, `SELECT 1` liveness checks excluded.
    pub fn calls(&self) -> Vec<Call> {
        self.log
            .lock()
            .iter()
            .filter(|c| c.sql != "SELECT 1")
            .cloned()
            .collect()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

fn build<F>(script: F, refuse: bool) -> Harness
where
    F: Fn(&str) -> DbResult<QueryResult> + Send + Sync + 'static,
{
    let log = Arc::new(Mutex::new(Vec::new()));
    let opens = Arc::new(AtomicUsize::new(0));
    let connector = Arc::new(ScriptedConnector {
        script: Arc::new(script),
        log: Arc::clone(&log),
        opens: Arc::clone(&opens),
        refuse,
    });
    let cache = Arc::new(ConnectionCache::new(
        CacheConfig::new(4, Duration::from_secs(3600)),
        connector,
    ));
    Harness { cache, log, opens }
}

/// Cache whose connections answer with `script`.
pub fn harness<F>(script: F) -> Harness
where
    F: Fn(&str) -> DbResult<QueryResult> + Send + Sync + 'static,
{
    build(script, false)
}

/// Cache whose connector refuses every connection.
pub fn refusing() -> Harness {
    build(|_| Ok(QueryResult::empty()), true)
}

/// Single-column varchar result.
pub fn strings(column: &str, values: &[&str]) -> QueryResult {
    table(
        &[(column, "varchar")],
        values.iter().map(|v| vec![Value::from(*v)]).collect(),
    )
}

pub fn table(columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::new(
        columns.iter().map(|(n, t)| Column::new(*n, *t)).collect(),
        rows,
        1,
    )
}

/// Parsed JSON payload of a tool result.
pub fn payload(result: &CallToolResult) -> Value {
    serde_json::from_str(result.first_text().unwrap_or("null")).unwrap_or(Value::Null)
}
