//! Connection pool module for Tunnelpool
//!
//! This module bounds, reuses and validates sockets to one destination,
//! tunneling them through an HTTP proxy when configured.

mod connection_pool;
mod guard;
mod registry;
mod socket;
mod stats;
mod validator;

pub use connection_pool::ConnectionPool;
pub use guard::PooledSocket;
pub use socket::{SocketId, SocketState};
pub use stats::{PoolStats, PoolStatsSnapshot};

use crate::config::join_host_port;
use std::fmt;

/// The destination sockets of a pool are grouped under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    host: String,
    port: u16,
}

impl PoolKey {
    /// Create a key for `host:port`
    pub fn new(host: &str, port: u16) -> Self {
        PoolKey {
            host: host.to_ascii_lowercase(),
            port,
        }
    }

    /// Target host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_host_port(&self.host, self.port))
    }
}
