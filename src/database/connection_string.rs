//! Parser for Trino JDBC connection strings.
//!
//! Format: `jdbc:trino://host:port?user=<u>&password=<p>&catalog=<c>&schema=<s>`
//!
//! Scheme, host, port and `user` are mandatory. Every query parameter is kept
//! verbatim in [`ConnectionParams::properties`].

use crate::error::DatabaseError;
use std::collections::BTreeMap;
use std::fmt;
use url::{Host, Url};

pub type ParseResult<T> = Result<T, DatabaseError>;

/// Required prefix of every connection string.
pub const JDBC_PREFIX: &str = "jdbc:trino://";

/// Parsed connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// All query parameters, including `user` and `password`.
    pub properties: BTreeMap<String, String>,
}

impl ConnectionParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn catalog(&self) -> Option<&str> {
        self.get("catalog")
    }

    pub fn schema(&self) -> Option<&str> {
        self.get("schema")
    }

    /// HTTPS when `SSL=true` is given or the port is 443.
    pub fn use_tls(&self) -> bool {
        match self.get("SSL").or_else(|| self.get("ssl")) {
            Some(v) => v.eq_ignore_ascii_case("true") || v == "1",
            None => self.port == 443,
        }
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls() { "https" } else { "http" };
        if self.host.contains(':') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let properties: BTreeMap<&str, &str> = self
            .properties
            .iter()
            .map(|(k, v)| {
                if k == "password" {
                    (k.as_str(), "***")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();

        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("properties", &properties)
            .finish()
    }
}

pub struct ConnectionStringParser;

impl ConnectionStringParser {
    pub fn parse(connection_string: &str) -> ParseResult<ConnectionParams> {
        let trimmed = connection_string.trim();

        if trimmed.is_empty() {
            return Err(DatabaseError::ConnectionString(
                "Connection string cannot be empty".into(),
            ));
        }

        if !trimmed.starts_with(JDBC_PREFIX) {
            return Err(Self::invalid_scheme());
        }
        let rest = &trimmed["jdbc:".len()..];

        let url = Url::parse(rest)
            .map_err(|e| DatabaseError::ConnectionString(format!("Malformed URL: {}", e).into()))?;

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_lowercase(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(Self::missing_host_or_port()),
        };
        let port = url.port().ok_or_else(Self::missing_host_or_port)?;

        let properties = Self::parse_query(&url);

        let user = properties
            .get("user")
            .cloned()
            .ok_or_else(|| DatabaseError::ConnectionString("Missing 'user' parameter".into()))?;
        let password = properties.get("password").cloned();

        Ok(ConnectionParams {
            host,
            port,
            user,
            password,
            properties,
        })
    }

    /// Parses the host out of a connection string, `None` if it does not parse.
    pub fn host(connection_string: &str) -> Option<String> {
        Self::parse(connection_string).ok().map(|p| p.host)
    }

    /// First value wins for repeated keys; empty values are dropped.
    fn parse_query(url: &Url) -> BTreeMap<String, String> {
        let mut pairs = BTreeMap::new();

        for (key, value) in url.query_pairs() {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            pairs
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        pairs
    }

    fn invalid_scheme() -> DatabaseError {
        DatabaseError::ConnectionString(
            format!("Connection string must start with '{}'", JDBC_PREFIX).into(),
        )
    }

    fn missing_host_or_port() -> DatabaseError {
        DatabaseError::ConnectionString("Missing host or port".into())
    }
}
