//! Connection cache counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache metrics for monitoring.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub connections_created: AtomicU64,
    pub connections_closed: AtomicU64,
    pub stale_connections: AtomicU64,
    pub expired_connections: AtomicU64,
    pub evicted_connections: AtomicU64,
    pub open_errors: AtomicU64,
    pub close_errors: AtomicU64,
    pub active_leases: AtomicU64,
    pub queries_executed: AtomicU64,
    pub query_errors: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.evicted_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open_error(&self) {
        self.open_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close_error(&self) {
        self.close_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lease_acquired(&self) {
        self.active_leases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lease_released(&self) {
        self.active_leases.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_query_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_error(&self) {
        self.query_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            stale_connections: self.stale_connections.load(Ordering::Relaxed),
            expired_connections: self.expired_connections.load(Ordering::Relaxed),
            evicted_connections: self.evicted_connections.load(Ordering::Relaxed),
            open_errors: self.open_errors.load(Ordering::Relaxed),
            close_errors: self.close_errors.load(Ordering::Relaxed),
            active_leases: self.active_leases.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            query_errors: self.query_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub connections_created: u64,
    pub connections_closed: u64,
    pub stale_connections: u64,
    pub expired_connections: u64,
    pub evicted_connections: u64,
    pub open_errors: u64,
    pub close_errors: u64,
    pub active_leases: u64,
    pub queries_executed: u64,
    pub query_errors: u64,
}
