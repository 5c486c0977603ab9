//! Connection pool implementation
//!
//! Hands out ready sockets to one logical destination, tunneling through a
//! proxy with CONNECT when configured.

use super::guard::PooledSocket;
use super::registry::Registry;
use super::socket::{Entry, SocketState};
use super::stats::PoolStatsSnapshot;
use super::validator;
use super::PoolKey;
use crate::config::{ExhaustionPolicy, PoolConfig};
use crate::error::PoolError;
use crate::proxy::{negotiate, ConnectRequest, PrefixedStream};
use crate::transport::{Endpoint, TcpTransport, Transport};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};

/// Connection pool for one destination
///
/// At most `max_size` sockets are checked out at any time. Idle sockets are
/// validated before reuse; a reused tunnel is not renegotiated.
#[derive(Debug)]
pub struct ConnectionPool<T: Transport> {
    /// Pool configuration
    config: PoolConfig,
    /// Identity sockets are grouped under
    key: PoolKey,
    /// Transport for creating connections
    transport: Arc<T>,
    /// Address actually dialed (proxy or target)
    endpoint: Endpoint,
    /// CONNECT request sent when proxying
    connect_request: ConnectRequest,
    /// One permit per checkout slot
    slots: Arc<Semaphore>,
    /// Idle set and checkout table
    registry: Arc<Registry<T::Stream>>,
}

impl ConnectionPool<TcpTransport> {
    /// Create a pool dialing over plain TCP
    pub fn from_config(config: PoolConfig) -> Result<Self> {
        let transport = Arc::new(TcpTransport::new(&config.tcp));
        Self::new(config, transport)
    }
}

impl<T: Transport> ConnectionPool<T> {
    /// Create a new connection pool
    pub fn new(config: PoolConfig, transport: Arc<T>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid pool configuration: {}", e))?;
        if config.max_size > Semaphore::MAX_PERMITS {
            anyhow::bail!("max_size cannot exceed {}", Semaphore::MAX_PERMITS);
        }

        let key = config.key();
        let endpoint = if config.use_proxy {
            Endpoint::new(&config.proxy_host, config.proxy_port)
        } else {
            Endpoint::new(&config.request_host, config.request_port)
        };
        let connect_request = ConnectRequest::new(&config.request_host, config.request_port)
            .with_headers(config.proxy.header_pairs());

        info!(
            "Created pool for {} via {} (max_size={}, proxy={})",
            key, endpoint, config.max_size, config.use_proxy
        );

        Ok(ConnectionPool {
            slots: Arc::new(Semaphore::new(config.max_size)),
            registry: Arc::new(Registry::new()),
            config,
            key,
            transport,
            endpoint,
            connect_request,
        })
    }

    /// Get the pool key
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Acquire a ready socket.
    ///
    /// Serves a validated idle socket when there is one, otherwise dials a
    /// new connection and, if proxying, runs the CONNECT handshake. When all
    /// slots are taken this waits up to `acquire_timeout` or fails at once,
    /// per the exhaustion policy. Nothing is retried.
    ///
    /// Cancel-safe: dropping the future closes any half-open connection and
    /// frees the reserved slot.
    pub async fn acquire(&self) -> Result<PooledSocket<T::Stream>, PoolError> {
        let permit = self.reserve_slot().await?;

        while let Some(mut entry) = self.registry.pop_idle()? {
            if validator::is_usable(&*self.transport, &mut entry, self.config.probe_timeout()).await {
                entry.checkouts += 1;
                let socket = self.check_out(entry, permit)?;
                self.registry.stats.record_reused();
                debug!("Reusing socket {} for {}", socket.id(), self.key);
                return Ok(socket);
            }
            self.registry.stats.record_discarded();
            entry.close().await;
        }

        let stream = self.open().await?;
        let entry = Entry::new(stream);
        let socket = self.check_out(entry, permit)?;
        self.registry.stats.record_created();
        debug!("Created socket {} for {}", socket.id(), self.key);
        Ok(socket)
    }

    /// Return a socket to the pool.
    ///
    /// With `reusable` set and a passing liveness check the socket becomes
    /// idle; otherwise it is closed. A socket from another pool is rejected
    /// with `NotTracked`, and after teardown the socket is closed and
    /// `Closed` is returned.
    pub async fn release(&self, socket: PooledSocket<T::Stream>, reusable: bool) -> Result<(), PoolError> {
        if !socket.belongs_to(&self.registry) {
            let id = socket.id();
            warn!("Socket {} released to a pool that does not own it", id);
            return Err(PoolError::NotTracked(id));
        }

        let (mut entry, permit) = socket.into_parts();
        match self.registry.check_in(entry.id) {
            Some(SocketState::InUse) => {}
            Some(_) => {
                entry.close().await;
                return Err(PoolError::Closed);
            }
            None => {
                let id = entry.id;
                entry.close().await;
                return Err(PoolError::NotTracked(id));
            }
        }

        let keep = reusable
            && validator::is_usable(&*self.transport, &mut entry, self.config.probe_timeout()).await;

        if keep {
            let id = entry.id;
            match self.registry.push_idle(entry) {
                Ok(()) => {
                    self.registry.stats.record_returned();
                    debug!("Socket {} returned to pool {}", id, self.key);
                }
                Err(entry) => {
                    // Torn down while probing
                    entry.close().await;
                    return Err(PoolError::Closed);
                }
            }
        } else {
            debug!("Discarding socket {} of pool {}", entry.id, self.key);
            self.registry.stats.record_discarded();
            entry.close().await;
        }

        // The slot frees only once the socket is idle again
        drop(permit);
        Ok(())
    }

    /// Whether a checked-out socket still looks alive
    pub async fn is_usable(&self, socket: &PooledSocket<T::Stream>) -> bool {
        socket.state() != SocketState::Closed
            && self
                .transport
                .probe(socket.get_ref(), self.config.probe_timeout())
                .await
                .is_alive()
    }

    /// Tear the pool down.
    ///
    /// Closes every idle socket, marks checked-out ones closed and makes
    /// every pending and future `acquire` fail with `Closed`.
    pub async fn close_all(&self) {
        self.slots.close();
        let idle = self.registry.close();
        let count = idle.len();
        for entry in idle {
            self.registry.stats.record_discarded();
            entry.close().await;
        }
        info!("Pool for {} closed, {} idle sockets shut down", self.key, count);
    }

    /// Whether `close_all` has been called
    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Number of sockets checked out right now
    pub fn in_use(&self) -> usize {
        self.registry.in_use()
    }

    /// Number of idle sockets right now
    pub fn idle(&self) -> usize {
        self.registry.idle()
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.registry.stats.snapshot(self.in_use(), self.idle())
    }

    /// Log pool health status
    pub fn log_health(&self) {
        self.stats().log_health(&self.key);
    }

    async fn reserve_slot(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        match self.config.exhaustion {
            ExhaustionPolicy::FailFast => {
                self.slots
                    .clone()
                    .try_acquire_owned()
                    .map_err(|e| match e {
                        TryAcquireError::Closed => PoolError::Closed,
                        TryAcquireError::NoPermits => PoolError::Exhausted(Duration::ZERO),
                    })
            }
            ExhaustionPolicy::Block => {
                let wait = self.config.acquire_timeout();
                match tokio::time::timeout(wait, self.slots.clone().acquire_owned()).await {
                    Err(_) => {
                        debug!("No free slot for {} after {:?}", self.key, wait);
                        Err(PoolError::Exhausted(wait))
                    }
                    Ok(Err(_)) => Err(PoolError::Closed),
                    Ok(Ok(permit)) => Ok(permit),
                }
            }
        }
    }

    fn check_out(
        &self,
        entry: Entry<T::Stream>,
        permit: OwnedSemaphorePermit,
    ) -> Result<PooledSocket<T::Stream>, PoolError> {
        match self.registry.check_out(entry) {
            Ok(entry) => Ok(PooledSocket::new(entry, permit, self.registry.clone())),
            // Torn down mid-acquire; dropping the entry closes it
            Err(_) => Err(PoolError::Closed),
        }
    }

    /// Dial the endpoint and, if proxying, establish the tunnel
    async fn open(&self) -> Result<PrefixedStream<T::Stream>, PoolError> {
        let stream = match self
            .transport
            .connect(&self.endpoint, self.config.connect_timeout())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                self.registry.stats.record_connect_failure();
                self.endpoint.forget().await;
                warn!("Failed to connect to {}: {:#}", self.endpoint, e);
                return Err(PoolError::connect(self.endpoint.to_string(), e));
            }
        };

        if !self.config.use_proxy {
            return Ok(PrefixedStream::plain(stream));
        }

        match negotiate(stream, &self.connect_request, self.config.network_timeout()).await {
            Ok(tunnel) => {
                debug!("Tunnel to {} through {} established", self.key, self.endpoint);
                Ok(tunnel)
            }
            Err(kind) => {
                self.registry.stats.record_handshake_failure();
                warn!("CONNECT {} through {} failed: {}", self.key, self.endpoint, kind);
                Err(PoolError::Proxy(kind))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PoolConfig {
            max_size: 0,
            ..PoolConfig::direct("example.com", 80)
        };
        let err = ConnectionPool::from_config(config).unwrap_err();
        assert!(err.to_string().contains("max_size"));
    }

    #[tokio::test]
    async fn test_new_pool_is_empty() {
        let pool =
            ConnectionPool::from_config(PoolConfig::proxied("127.0.0.1", 3128, "test", 443)).unwrap();
        assert_eq!(pool.key(), &PoolKey::new("test", 443));
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle(), 0);
        assert!(!pool.is_closed());
        assert_eq!(pool.stats().total_created, 0);
    }

    #[tokio::test]
    async fn test_acquire_after_close_all() {
        let pool = ConnectionPool::from_config(PoolConfig::direct("127.0.0.1", 9)).unwrap();
        pool.close_all().await;

        assert!(pool.is_closed());
        assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn test_fail_fast_after_close_all() {
        let config = PoolConfig {
            exhaustion: ExhaustionPolicy::FailFast,
            ..PoolConfig::direct("127.0.0.1", 9)
        };
        let pool = ConnectionPool::from_config(config).unwrap();
        pool.close_all().await;

        assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    }
}
