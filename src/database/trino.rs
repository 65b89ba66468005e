//! Trino driver speaking the client REST protocol over `reqwest`.
//!
//! A statement is submitted with `POST /v1/statement` and its results are
//! paged by following `nextUri` until the server stops returning one.

use crate::config::TrinoConfig;
use crate::database::connection_string::ConnectionParams;
use crate::database::result::{Column, QueryResult, Row};
use crate::database::traits::{Connection, Connector};
use crate::error::{DatabaseError, DbResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const HEADER_USER: &str = "X-Trino-User";
const HEADER_SOURCE: &str = "X-Trino-Source";
const HEADER_CATALOG: &str = "X-Trino-Catalog";
const HEADER_SCHEMA: &str = "X-Trino-Schema";
const HEADER_SET_CATALOG: &str = "X-Trino-Set-Catalog";
const HEADER_SET_SCHEMA: &str = "X-Trino-Set-Schema";

const RETRY_DELAY_MS: u64 = 100;

/// Opens [`TrinoConnection`]s.
pub struct TrinoConnector {
    client: Client,
    config: TrinoConfig,
}

impl TrinoConnector {
    pub fn new(config: TrinoConfig) -> DbResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DatabaseError::ConnectionOpen(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Connector for TrinoConnector {
    #[instrument(skip(self, params), fields(host = %params.host, port = params.port))]
    async fn open(&self, params: &ConnectionParams) -> DbResult<Arc<dyn Connection>> {
        let connection = TrinoConnection::new(self.client.clone(), params, &self.config);

        let info = connection
            .server_info()
            .await
            .map_err(|e| DatabaseError::ConnectionOpen(e.to_string()))?;

        if info.starting {
            return Err(DatabaseError::ConnectionOpen(format!(
                "Trino at {}:{} is still starting",
                params.host, params.port
            )));
        }

        info!(
            "Created new Trino connection to {}:{} (version {})",
            params.host,
            params.port,
            info.node_version.version.as_deref().unwrap_or("unknown")
        );

        Ok(Arc::new(connection))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Session {
    catalog: Option<String>,
    schema: Option<String>,
}

impl Session {
    /// Catalog and schema for one statement.
    ///
    /// An explicit catalog replaces the session namespace entirely; a schema
    /// alone keeps the session catalog.
    fn scoped<'a>(
        &'a self,
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
    ) -> (Option<&'a str>, Option<&'a str>) {
        match (catalog, schema) {
            (Some(catalog), schema) => (Some(catalog), schema),
            (None, Some(schema)) => (self.catalog.as_deref(), Some(schema)),
            (None, None) => (self.catalog.as_deref(), self.schema.as_deref()),
        }
    }
}

/// One Trino client session: credentials plus the current catalog and schema.
pub struct TrinoConnection {
    client: Client,
    base_url: String,
    user: String,
    password: Option<String>,
    source: String,
    session: Mutex<Session>,
    closed: AtomicBool,
    max_retries: u32,
    request_timeout: Duration,
}

impl TrinoConnection {
    pub fn new(client: Client, params: &ConnectionParams, config: &TrinoConfig) -> Self {
        Self {
            client,
            base_url: params.base_url(),
            user: params.user.clone(),
            password: params.password.clone(),
            source: params
                .get("source")
                .map(str::to_string)
                .unwrap_or_else(|| config.source.clone()),
            session: Mutex::new(Session {
                catalog: params.catalog().map(str::to_string),
                schema: params.schema().map(str::to_string),
            }),
            closed: AtomicBool::new(false),
            max_retries: config.max_retries,
            request_timeout: config.request_timeout,
        }
    }

    /// Current catalog, updated by `USE` statements.
    pub fn catalog(&self) -> Option<String> {
        self.session.lock().catalog.clone()
    }

    /// Current schema, updated by `USE` statements.
    pub fn schema(&self) -> Option<String> {
        self.session.lock().schema.clone()
    }

    async fn server_info(&self) -> DbResult<ServerInfo> {
        let url = format!("{}/v1/info", self.base_url);
        let response = self.send(|| self.authorize(self.client.get(&url))).await?;
        response.json::<ServerInfo>().await.map_err(|e| self.map_http(e))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(HEADER_USER, &self.user);
        match &self.password {
            Some(password) => request.basic_auth(&self.user, Some(password)),
            None => request,
        }
    }

    /// Request headers for one statement; the session itself is not modified.
    fn session_headers(&self, catalog: Option<&str>, schema: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(source) = HeaderValue::from_str(&self.source) {
            headers.insert(HEADER_SOURCE, source);
        }

        let session = self.session.lock();
        let (catalog, schema) = session.scoped(catalog, schema);
        if let Some(catalog) = catalog
            && let Ok(value) = HeaderValue::from_str(catalog)
        {
            headers.insert(HEADER_CATALOG, value);
        }
        if let Some(schema) = schema
            && let Ok(value) = HeaderValue::from_str(schema)
        {
            headers.insert(HEADER_SCHEMA, value);
        }
        headers
    }

    /// Applies `X-Trino-Set-*` response headers to the session.
    fn apply_session_updates(&self, headers: &HeaderMap) {
        let catalog = headers
            .get(HEADER_SET_CATALOG)
            .and_then(|v| v.to_str().ok());
        let schema = headers.get(HEADER_SET_SCHEMA).and_then(|v| v.to_str().ok());

        if catalog.is_none() && schema.is_none() {
            return;
        }

        let mut session = self.session.lock();
        if let Some(catalog) = catalog {
            debug!("Session catalog set to {}", catalog);
            session.catalog = Some(catalog.to_string());
        }
        if let Some(schema) = schema {
            debug!("Session schema set to {}", schema);
            session.schema = Some(schema.to_string());
        }
    }

    /// Sends a request, retrying 502/503/504 with linear back-off.
    async fn send<F>(&self, build: F) -> DbResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build().send().await.map_err(|e| self.map_http(e))?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if is_retryable(status) && attempt < self.max_retries {
                attempt += 1;
                debug!("Trino returned {}, retry {}/{}", status, attempt, self.max_retries);
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(DatabaseError::Http(format!(
                "{} {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
    }

    async fn read_page(&self, response: Response) -> DbResult<QueryResults> {
        self.apply_session_updates(response.headers());
        response
            .json::<QueryResults>()
            .await
            .map_err(|e| self.map_http(e))
    }

    /// Best-effort cancellation of the rest of a query.
    async fn cancel(&self, next_uri: &str) {
        if let Err(e) = self
            .authorize(self.client.delete(next_uri))
            .send()
            .await
        {
            debug!("Failed to cancel query: {}", e);
        }
    }

    fn map_http(&self, e: reqwest::Error) -> DatabaseError {
        if e.is_timeout() {
            DatabaseError::Timeout(self.request_timeout.as_millis() as u64)
        } else {
            DatabaseError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl Connection for TrinoConnection {
    async fn fetch_in(
        &self,
        sql: &str,
        max_rows: Option<usize>,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> DbResult<QueryResult> {
        if self.is_closed() {
            return Err(DatabaseError::ConnectionClosed);
        }

        let started = Instant::now();
        let statement_url = format!("{}/v1/statement", self.base_url);
        let body = sql.to_string();
        let headers = self.session_headers(catalog, schema);

        let response = self
            .send(|| {
                self.authorize(self.client.post(&statement_url))
                    .headers(headers.clone())
                    .body(body.clone())
            })
            .await?;
        let mut page = self.read_page(response).await?;

        let mut columns: Vec<Column> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        let mut truncated = false;

        loop {
            if let Some(error) = page.error {
                debug!("Query {} failed: {}", page.id, error.describe());
                return Err(DatabaseError::StatementExecution(error.describe()));
            }

            if columns.is_empty()
                && let Some(wire) = page.columns.take()
            {
                columns = wire
                    .into_iter()
                    .map(|c| Column::new(c.name, c.data_type))
                    .collect();
            }

            if let Some(data) = page.data.take() {
                rows.extend(data);
            }

            if let Some(max) = max_rows
                && rows.len() >= max
            {
                rows.truncate(max);
                if let Some(next) = page.next_uri.as_deref() {
                    self.cancel(next).await;
                    truncated = true;
                }
                break;
            }

            let Some(next) = page.next_uri.take() else {
                break;
            };
            let response = self.send(|| self.authorize(self.client.get(&next))).await?;
            page = self.read_page(response).await?;
        }

        let elapsed = started.elapsed().as_millis() as u64;
        Ok(QueryResult::new(columns, rows, elapsed).with_truncated(truncated))
    }

    async fn close(&self) -> DbResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!("Connection to {} closed twice", self.base_url);
            return Ok(());
        }
        debug!("Closed Trino connection to {}", self.base_url);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// `GET /v1/info` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    #[serde(default)]
    node_version: NodeVersion,
    #[serde(default)]
    starting: bool,
}

#[derive(Debug, Default, Deserialize)]
struct NodeVersion {
    version: Option<String>,
}

/// One page of `/v1/statement` results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    #[serde(default)]
    id: String,
    next_uri: Option<String>,
    columns: Option<Vec<WireColumn>>,
    data: Option<Vec<Vec<Value>>>,
    error: Option<QueryError>,
}

#[derive(Debug, Deserialize)]
struct WireColumn {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryError {
    message: String,
    error_name: Option<String>,
}

impl QueryError {
    fn describe(&self) -> String {
        match &self.error_name {
            Some(name) => format!("{}: {}", name, self.message),
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ConnectionStringParser;

    fn connection(url: &str) -> TrinoConnection {
        let params = ConnectionStringParser::parse(url).unwrap();
        TrinoConnection::new(Client::new(), &params, &TrinoConfig::default())
    }

    #[test]
    fn test_session_from_params() {
        let conn = connection("jdbc:trino://localhost:8080?user=a&catalog=hive&schema=web");
        assert_eq!(conn.catalog().as_deref(), Some("hive"));
        assert_eq!(conn.schema().as_deref(), Some("web"));

        let headers = conn.session_headers(None, None);
        assert_eq!(headers.get(HEADER_CATALOG).unwrap(), "hive");
        assert_eq!(headers.get(HEADER_SCHEMA).unwrap(), "web");
        assert_eq!(headers.get(HEADER_SOURCE).unwrap(), "trino-mcp");
    }

    #[test]
    fn test_source_override() {
        let conn = connection("jdbc:trino://localhost:8080?user=a&source=nightly");
        let headers = conn.session_headers(None, None);
        assert_eq!(headers.get(HEADER_SOURCE).unwrap(), "nightly");
        assert!(headers.get(HEADER_CATALOG).is_none());
    }

    #[test]
    fn test_statement_namespace_leaves_session_alone() {
        let conn = connection("jdbc:trino://localhost:8080?user=a&catalog=hive&schema=web");

        let headers = conn.session_headers(None, Some("raw"));
        assert_eq!(headers.get(HEADER_CATALOG).unwrap(), "hive");
        assert_eq!(headers.get(HEADER_SCHEMA).unwrap(), "raw");

        let headers = conn.session_headers(Some("iceberg"), None);
        assert_eq!(headers.get(HEADER_CATALOG).unwrap(), "iceberg");
        assert!(headers.get(HEADER_SCHEMA).is_none());

        let headers = conn.session_headers(Some("iceberg"), Some("staging"));
        assert_eq!(headers.get(HEADER_CATALOG).unwrap(), "iceberg");
        assert_eq!(headers.get(HEADER_SCHEMA).unwrap(), "staging");

        assert_eq!(conn.catalog().as_deref(), Some("hive"));
        assert_eq!(conn.schema().as_deref(), Some("web"));
    }

    #[test]
    fn test_use_updates_session() {
        let conn = connection("jdbc:trino://localhost:8080?user=a");
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_SET_CATALOG, HeaderValue::from_static("iceberg"));
        headers.insert(HEADER_SET_SCHEMA, HeaderValue::from_static("raw"));

        conn.apply_session_updates(&headers);

        assert_eq!(conn.catalog().as_deref(), Some("iceberg"));
        assert_eq!(conn.schema().as_deref(), Some("raw"));
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_statements() {
        let conn = connection("jdbc:trino://localhost:8080?user=a");
        conn.close().await.unwrap();
        assert!(conn.is_closed());

        let err = conn.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionClosed));
    }

    #[test]
    fn test_page_deserialization() {
        let page: QueryResults = serde_json::from_value(serde_json::json!({
            "id": "20240101_000000_00001_abcde",
            "infoUri": "http://localhost:8080/ui/query.html?20240101_000000_00001_abcde",
            "nextUri": "http://localhost:8080/v1/statement/executing/1",
            "columns": [{"name": "_col0", "type": "integer", "typeSignature": {}}],
            "data": [[1]],
            "stats": {"state": "RUNNING"}
        }))
        .unwrap();

        assert_eq!(page.columns.as_ref().unwrap()[0].data_type, "integer");
        assert_eq!(page.data.as_ref().unwrap().len(), 1);
        assert!(page.next_uri.is_some());
        assert!(page.error.is_none());
    }

    #[test]
    fn test_error_description() {
        let page: QueryResults = serde_json::from_value(serde_json::json!({
            "id": "q1",
            "error": {
                "message": "line 1:8: Column 'x' cannot be resolved",
                "errorName": "COLUMN_NOT_FOUND",
                "errorCode": 47
            }
        }))
        .unwrap();

        assert_eq!(
            page.error.unwrap().describe(),
            "COLUMN_NOT_FOUND: line 1:8: Column 'x' cannot be resolved"
        );
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }
}
