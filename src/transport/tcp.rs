//! TCP transport implementation
//!
//! Provides plain TCP connections to proxies and targets.

use super::{Endpoint, Liveness, SocketOpts, Transport};
use crate::config::TcpConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::poll_fn;
use std::io;
use std::task::Poll;
use std::time::Duration;
use tokio::io::ReadBuf;
use tokio::net::TcpStream;

/// TCP transport for plain connections
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
}

impl TcpTransport {
    /// Create a new TCP transport with default options
    pub fn with_defaults() -> Self {
        TcpTransport {
            socket_opts: SocketOpts::default(),
        }
    }

    /// Create a TCP transport from configuration
    pub fn new(config: &TcpConfig) -> Self {
        TcpTransport {
            socket_opts: SocketOpts::from_tcp_config(config),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Self::Stream> {
        let dial = async {
            let mut last_err = None;
            for candidate in endpoint.candidates().await? {
                match TcpStream::connect(candidate).await {
                    Ok(stream) => {
                        endpoint.remember(candidate).await;
                        return Ok(stream);
                    }
                    Err(e) => {
                        tracing::debug!("Connect to {} ({}) failed: {}", endpoint, candidate, e);
                        last_err = Some(e);
                    }
                }
            }
            let err = last_err.unwrap_or_else(|| io::ErrorKind::NotFound.into());
            Err::<TcpStream, anyhow::Error>(
                anyhow::Error::new(err).context(format!("Failed to connect to {}", endpoint)),
            )
        };

        let stream = tokio::time::timeout(timeout, dial)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
            .with_context(|| format!("Connection timeout to {}", endpoint))??;

        if let Err(e) = self.socket_opts.apply(&stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }

        tracing::debug!("TCP connection established to {}", endpoint);

        Ok(stream)
    }

    async fn probe(&self, conn: &Self::Stream, timeout: Duration) -> Liveness {
        let mut byte = [0u8; 1];
        // Polled once: a socket with nothing to read is alive
        let check = poll_fn(|cx| {
            let mut buf = ReadBuf::new(&mut byte);
            Poll::Ready(match conn.poll_peek(cx, &mut buf) {
                Poll::Pending => Liveness::Alive,
                Poll::Ready(Ok(0)) => Liveness::Closed,
                Poll::Ready(Ok(_)) => Liveness::Alive,
                Poll::Ready(Err(e)) => {
                    tracing::debug!("Liveness probe failed: {}", e);
                    Liveness::Errored
                }
            })
        });

        tokio::time::timeout(timeout, check)
            .await
            .unwrap_or(Liveness::Alive)
    }
}
