//! Keyed connection cache with capacity and TTL limits.
//!
//! Connections are keyed by a digest of their connection string. A single
//! async mutex guards purge, lookup, liveness probe, eviction and creation so
//! the capacity and one-entry-per-key invariants hold under concurrent
//! callers. The lock is released before the caller uses the connection, on
//! both the hit and miss paths.

mod lease;
pub mod metrics;

pub use lease::ConnectionLease;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};

use crate::config::CacheConfig;
use crate::database::{Connection, ConnectionKey, ConnectionStringParser, Connector};
use crate::error::{DatabaseError, DbResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Round-trip used to check a cached connection is still alive.
const PROBE_SQL: &str = "SELECT 1";

struct CacheEntry {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    created_wall: DateTime<Utc>,
    /// Kept so statistics can report the host without storing parsed fields.
    source: String,
    /// Insertion order, breaks `created_at` ties during eviction.
    sequence: u64,
}

impl CacheEntry {
    fn is_expired(&self, config: &CacheConfig) -> bool {
        self.created_at.elapsed() > config.connection_ttl
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ConnectionKey, CacheEntry>,
    next_sequence: u64,
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy)]
enum Removal {
    Expired,
    Stale,
    Evicted,
    Released,
}

impl Removal {
    fn as_str(self) -> &'static str {
        match self {
            Removal::Expired => "expired",
            Removal::Stale => "stale",
            Removal::Evicted => "evicted",
            Removal::Released => "released",
        }
    }
}

/// Bounded, time-limited cache of live connections.
pub struct ConnectionCache {
    config: CacheConfig,
    connector: Arc<dyn Connector>,
    state: Mutex<CacheState>,
    metrics: Arc<CacheMetrics>,
}

impl ConnectionCache {
    pub fn new(config: CacheConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            state: Mutex::new(CacheState::default()),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Returns a usable connection for `connection_string`.
    ///
    /// A cached connection is reused if it has not expired and answers a
    /// liveness probe. Otherwise a new one is opened, evicting the oldest
    /// entry first if the cache is full.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ConnectionString`] for a malformed string and
    /// [`DatabaseError::ConnectionOpen`] if the driver cannot connect. Open
    /// failures are not retried.
    pub async fn acquire(&self, connection_string: &str) -> DbResult<ConnectionLease> {
        let key = ConnectionKey::derive(connection_string);
        let mut state = self.state.lock().await;

        self.purge_expired(&mut state).await;

        if let Some(entry) = state.entries.get(&key) {
            let connection = Arc::clone(&entry.connection);
            match connection.execute(PROBE_SQL).await {
                Ok(_) => {
                    self.metrics.record_hit();
                    debug!("Reusing cached connection {}", key.redacted());
                    drop(state);
                    return Ok(ConnectionLease::new(key, connection, Arc::clone(&self.metrics)));
                }
                Err(e) => {
                    let stale = DatabaseError::StaleConnection(e.to_string());
                    warn!("Cached connection {} is stale: {}", key.redacted(), stale);
                    if let Some(entry) = state.entries.remove(&key) {
                        self.close_entry(&key, entry, Removal::Stale).await;
                    }
                }
            }
        }

        let params = ConnectionStringParser::parse(connection_string)?;

        if state.entries.len() >= self.config.max_connections {
            self.evict_oldest(&mut state).await;
        }

        let connection = self.connector.open(&params).await.map_err(|e| {
            self.metrics.record_open_error();
            if e.is_connection_error() {
                e
            } else {
                DatabaseError::ConnectionOpen(e.to_string())
            }
        })?;

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key.clone(),
            CacheEntry {
                connection: Arc::clone(&connection),
                created_at: Instant::now(),
                created_wall: Utc::now(),
                source: connection_string.to_string(),
                sequence,
            },
        );
        self.metrics.record_connection_created();

        info!(
            "Cached new connection {} to {} ({}/{})",
            key.redacted(),
            params.host,
            state.entries.len(),
            self.config.max_connections
        );
        drop(state);

        Ok(ConnectionLease::new(key, connection, Arc::clone(&self.metrics)))
    }

    /// Closes every cached connection and empties the cache.
    pub async fn release_all(&self) {
        let mut state = self.state.lock().await;
        if state.entries.is_empty() {
            return;
        }

        let count = state.entries.len();
        let mut drained: Vec<_> = state.entries.drain().collect();
        drained.sort_by_key(|(_, entry)| entry.sequence);
        for (key, entry) in drained {
            self.close_entry(&key, entry, Removal::Released).await;
        }

        info!("Released {} cached connections", count);
    }

    /// Occupancy report. Does not purge expired entries.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;

        let mut entries: Vec<_> = state.entries.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.sequence);

        let connections = entries
            .into_iter()
            .map(|(key, entry)| ConnectionInfo {
                key_prefix: key.redacted(),
                created_at: entry.created_wall,
                age_seconds: entry.created_at.elapsed().as_secs_f64(),
                host: ConnectionStringParser::host(&entry.source),
            })
            .collect();

        CacheStats {
            active_connections: state.entries.len(),
            max_connections: self.config.max_connections,
            connection_ttl: self.config.connection_ttl.as_secs(),
            connections,
        }
    }

    async fn purge_expired(&self, state: &mut CacheState) {
        let expired: Vec<ConnectionKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(&self.config))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            if let Some(entry) = state.entries.remove(&key) {
                self.close_entry(&key, entry, Removal::Expired).await;
            }
        }
    }

    async fn evict_oldest(&self, state: &mut CacheState) {
        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.created_at, entry.sequence))
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest
            && let Some(entry) = state.entries.remove(&key)
        {
            self.close_entry(&key, entry, Removal::Evicted).await;
        }
    }

    /// Best-effort close; failures are logged and counted.
    async fn close_entry(&self, key: &ConnectionKey, entry: CacheEntry, reason: Removal) {
        match reason {
            Removal::Expired => self.metrics.record_expired(),
            Removal::Stale => self.metrics.record_stale(),
            Removal::Evicted => self.metrics.record_evicted(),
            Removal::Released => {}
        }

        match entry.connection.close().await {
            Ok(()) => {
                self.metrics.record_connection_closed();
                debug!("Closed {} connection {}", reason.as_str(), key.redacted());
            }
            Err(e) => {
                self.metrics.record_close_error();
                warn!(
                    "Failed to close {} connection {}: {}",
                    reason.as_str(),
                    key.redacted(),
                    e
                );
            }
        }
    }
}

/// Cache occupancy report.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub active_connections: usize,
    pub max_connections: usize,
    /// Seconds.
    pub connection_ttl: u64,
    pub connections: Vec<ConnectionInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
    pub age_seconds: f64,
    pub host: Option<String>,
}
