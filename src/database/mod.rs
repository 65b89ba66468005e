//! Database layer: connection string handling, cache keys and the Trino driver.
//!
//! The [`ConnectionCache`](crate::cache::ConnectionCache) depends only on the
//! [`Connector`] and [`Connection`] traits; [`TrinoConnector`] is the
//! production implementation.

pub mod connection_key;
pub mod connection_string;
pub mod result;
pub mod traits;
pub mod trino;

pub use connection_key::ConnectionKey;
pub use connection_string::{ConnectionParams, ConnectionStringParser};
pub use result::*;
pub use traits::{Connection, Connector};
pub use trino::{TrinoConnection, TrinoConnector};
