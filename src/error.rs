//! Error types for Tunnelpool
//!
//! This module defines the discriminated failures surfaced by the pool and
//! the proxy handshake. Callers are expected to branch on them.

use crate::pool::SocketId;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Reasons a proxy CONNECT handshake can fail
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyError {
    /// The proxy connection failed before a single byte was received
    #[error("no response from proxy")]
    NoResponse,

    /// The proxy closed the connection without sending anything
    #[error("proxy closed the connection")]
    ConnectionClosed,

    /// The proxy response is not an HTTP status line
    #[error("malformed response from proxy")]
    MalformedResponse,

    /// The proxy answered with a status other than 200
    #[error("proxy rejected tunnel with status {0}")]
    Rejected(u16),

    /// The proxy did not finish its response in time
    #[error("timed out waiting for proxy response")]
    Timeout,
}

impl ProxyError {
    /// Status code returned by the proxy, if it got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            ProxyError::Rejected(code) => Some(*code),
            _ => None,
        }
    }
}

/// Main error type for pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// Transport failure while dialing the proxy or the target
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Endpoint that was dialed
        addr: String,
        /// Underlying transport error
        #[source]
        source: anyhow::Error,
    },

    /// The proxy handshake failed
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// No slot became free within the wait window
    #[error("Pool exhausted: no socket available after {0:?}")]
    Exhausted(Duration),

    /// The pool has been torn down
    #[error("Pool closed")]
    Closed,

    /// The socket is not checked out of this pool
    #[error("Socket {0} is not checked out of this pool")]
    NotTracked(SocketId),
}

impl PoolError {
    /// Build a connect error for the given endpoint
    pub fn connect(addr: impl Into<String>, source: anyhow::Error) -> Self {
        PoolError::Connect {
            addr: addr.into(),
            source,
        }
    }

    /// Whether the failure happened at the transport level
    pub fn is_connect(&self) -> bool {
        matches!(self, PoolError::Connect { .. })
    }

    /// The handshake failure, if this is a proxy error
    pub fn proxy_error(&self) -> Option<ProxyError> {
        match self {
            PoolError::Proxy(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl From<PoolError> for io::Error {
    fn from(err: PoolError) -> Self {
        let kind = match &err {
            PoolError::Connect { .. } => io::ErrorKind::ConnectionRefused,
            PoolError::Proxy(ProxyError::Timeout) | PoolError::Exhausted(_) => {
                io::ErrorKind::TimedOut
            }
            PoolError::Proxy(_) => io::ErrorKind::ConnectionAborted,
            PoolError::Closed => io::ErrorKind::NotConnected,
            PoolError::NotTracked(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
