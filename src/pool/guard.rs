//! Checked-out socket handle
//!
//! A `PooledSocket` is exclusively owned by the caller that acquired it.
//! Hand it back with `ConnectionPool::release`. Dropping it instead closes
//! the socket and frees its slot.

use super::registry::Registry;
use super::socket::{Entry, SocketId, SocketState};
use crate::proxy::PrefixedStream;
use std::io;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

/// A socket checked out of a [`ConnectionPool`](super::ConnectionPool)
///
/// Reads and writes go straight to the (possibly tunneled) connection.
///
/// Releasing consumes the handle, so the same socket cannot be released
/// twice:
///
/// ```compile_fail
/// # async fn twice(pool: tunnelpool::pool::ConnectionPool<tunnelpool::transport::TcpTransport>) {
/// let socket = pool.acquire().await.unwrap();
/// pool.release(socket, true).await.unwrap();
/// pool.release(socket, true).await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct PooledSocket<S> {
    entry: Option<Entry<S>>,
    permit: Option<OwnedSemaphorePermit>,
    registry: Arc<Registry<S>>,
}

impl<S> PooledSocket<S> {
    pub(crate) fn new(entry: Entry<S>, permit: OwnedSemaphorePermit, registry: Arc<Registry<S>>) -> Self {
        PooledSocket {
            entry: Some(entry),
            permit: Some(permit),
            registry,
        }
    }

    fn entry(&self) -> &Entry<S> {
        self.entry.as_ref().expect("Socket already taken")
    }

    fn entry_mut(&mut self) -> &mut Entry<S> {
        self.entry.as_mut().expect("Socket already taken")
    }

    /// Identifier of this socket
    pub fn id(&self) -> SocketId {
        self.entry().id
    }

    /// Lifecycle state; always `InUse` while held
    pub fn state(&self) -> SocketState {
        self.entry().state
    }

    /// How many times this socket has been handed out, this time included
    pub fn checkouts(&self) -> u64 {
        self.entry().checkouts
    }

    /// Whether this socket was served from the idle set
    pub fn is_reused(&self) -> bool {
        self.checkouts() > 1
    }

    /// Time since the socket was established
    pub fn age(&self) -> Duration {
        self.entry().age()
    }

    /// When the socket last passed a liveness check
    pub fn last_validated(&self) -> Instant {
        self.entry().last_validated
    }

    /// Take the stream out of the pool for good.
    ///
    /// The socket stops counting against the pool and will not be reused,
    /// e.g. after handing it to a TLS layer.
    pub fn detach(mut self) -> PrefixedStream<S> {
        let entry = self.entry.take().expect("Socket already taken");
        self.registry.check_in(entry.id);
        debug!("Socket {} detached from pool", entry.id);
        entry.stream
    }

    pub(crate) fn belongs_to(&self, registry: &Arc<Registry<S>>) -> bool {
        Arc::ptr_eq(&self.registry, registry)
    }

    /// Split into the pool entry and its slot, disarming the drop hook
    pub(crate) fn into_parts(mut self) -> (Entry<S>, Option<OwnedSemaphorePermit>) {
        let entry = self.entry.take().expect("Socket already taken");
        (entry, self.permit.take())
    }
}

impl<S> Deref for PooledSocket<S> {
    type Target = PrefixedStream<S>;

    fn deref(&self) -> &Self::Target {
        &self.entry().stream
    }
}

impl<S> DerefMut for PooledSocket<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry_mut().stream
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PooledSocket<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut **self.get_mut()).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PooledSocket<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut **self.get_mut()).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut **self.get_mut()).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut **self.get_mut()).poll_shutdown(cx)
    }
}

impl<S> Drop for PooledSocket<S> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            // Not released: close by dropping, the permit frees the slot
            self.registry.check_in(entry.id);
            self.registry.stats.record_discarded();
            debug!("Socket {} dropped without release, closing", entry.id);
        }
    }
}
