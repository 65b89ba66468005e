//! Opaque cache keys derived from connection strings.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the hex digest prefix used as a key.
const KEY_LEN: usize = 16;

/// Length of the key prefix exposed in statistics.
const REDACTED_LEN: usize = 8;

/// Truncated SHA-256 of a connection string.
///
/// The raw string carries credentials, so the key is what ends up in logs
/// and statistics instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    pub fn derive(connection_string: &str) -> Self {
        let digest = Sha256::digest(connection_string.as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(KEY_LEN);
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters followed by `...`.
    pub fn redacted(&self) -> String {
        format!("{}...", &self.0[..REDACTED_LEN])
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
