//! Dial targets
//!
//! An [`Endpoint`] is the `host:port` a pool dials, either the proxy or the
//! target itself. The address that last accepted a connection is remembered
//! so later dials skip name resolution.

use crate::config::join_host_port;
use anyhow::{Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Host and port to dial, with the last working address
#[derive(Debug, Clone)]
pub struct Endpoint {
    host: String,
    port: u16,
    last_good: Arc<RwLock<Option<SocketAddr>>>,
}

impl Endpoint {
    /// Create an endpoint for `host:port`
    pub fn new(host: &str, port: u16) -> Self {
        Endpoint {
            host: host.to_string(),
            port,
            last_good: Arc::new(RwLock::new(None)),
        }
    }

    /// Host name or IP literal, without brackets
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Addresses to try, in order.
    ///
    /// Only the remembered address when there is one; otherwise every
    /// address the host resolves to.
    pub async fn candidates(&self) -> Result<Vec<SocketAddr>> {
        if let Some(addr) = *self.last_good.read().await {
            return Ok(vec![addr]);
        }

        let resolved: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("Failed to resolve {}", self))?
            .collect();
        if resolved.is_empty() {
            anyhow::bail!("No addresses found for {}", self);
        }
        Ok(resolved)
    }

    /// Remember the address a connection succeeded on
    pub async fn remember(&self, addr: SocketAddr) {
        *self.last_good.write().await = Some(addr);
    }

    /// Drop the remembered address, forcing resolution on the next dial
    pub async fn forget(&self) {
        *self.last_good.write().await = None;
    }

    /// The remembered address, if any
    pub async fn last_good(&self) -> Option<SocketAddr> {
        *self.last_good.read().await
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_host_port(&self.host, self.port))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint {
            host: addr.ip().to_string(),
            port: addr.port(),
            last_good: Arc::new(RwLock::new(Some(addr))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("proxy.local", 3128).to_string(), "proxy.local:3128");
        assert_eq!(Endpoint::new("::1", 3128).to_string(), "[::1]:3128");
    }

    #[tokio::test]
    async fn test_candidates_resolve_literals() {
        let v4 = Endpoint::new("127.0.0.1", 8080);
        assert_eq!(
            v4.candidates().await.unwrap(),
            vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)]
        );

        let v6 = Endpoint::new("::1", 3128);
        assert_eq!(
            v6.candidates().await.unwrap(),
            vec![SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 3128)]
        );
    }

    #[tokio::test]
    async fn test_remembered_address_wins() {
        let endpoint = Endpoint::new("invalid.invalid", 1234);
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 1234);

        endpoint.remember(addr).await;
        assert_eq!(endpoint.candidates().await.unwrap(), vec![addr]);

        endpoint.forget().await;
        assert!(endpoint.last_good().await.is_none());
    }

    #[tokio::test]
    async fn test_from_socket_addr() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 443);
        let endpoint = Endpoint::from(addr);

        assert_eq!(endpoint.host(), "10.0.0.1");
        assert_eq!(endpoint.port(), 443);
        assert_eq!(endpoint.last_good().await, Some(addr));
    }
}
