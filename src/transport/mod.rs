//! Transport module for Tunnelpool
//!
//! This module provides the byte-stream transport abstraction the pool
//! dials through, and its TCP implementation.

mod endpoint;
mod tcp;

pub use endpoint::Endpoint;
pub use tcp::TcpTransport;

use crate::config::TcpConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Socket options for configuring connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Create socket options from TCP config
    pub fn from_tcp_config(config: &TcpConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs),
            keepalive_interval: Some(config.keepalive_interval),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Result of a non-consuming liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Nothing indicates the peer went away
    Alive,
    /// The peer closed its side
    Closed,
    /// The socket reported an error
    Errored,
}

impl Liveness {
    /// Whether the socket may be handed out again
    pub fn is_alive(self) -> bool {
        self == Liveness::Alive
    }
}

/// Transport trait for dialing byte streams
///
/// Implementations connect to a `host:port` and return a stream that
/// implements AsyncRead + AsyncWrite. Sending, receiving and closing are
/// the stream's own `write_all`, `read` and `shutdown`.
#[async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// The stream type produced by this transport
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync + Debug + 'static;

    /// Connect to a remote address, giving up after `timeout`
    async fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Self::Stream>;

    /// Check, without consuming data, whether the peer is still there.
    ///
    /// Must return within roughly `timeout`.
    async fn probe(&self, conn: &Self::Stream, timeout: Duration) -> Liveness;
}
