//! Pooled socket records
//!
//! A socket's identity, lifecycle state and timestamps.

use crate::helper::CLOSE_TIMEOUT;
use crate::proxy::PrefixedStream;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a pooled socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    pub(crate) fn next() -> Self {
        SocketId(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a pooled socket
///
/// `Idle <-> InUse`, and either may become `Closed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Owned by the pool, available to the next acquire
    Idle,
    /// Owned by a caller
    InUse,
    /// Closed, never reused
    Closed,
}

/// A socket together with its pool bookkeeping
#[derive(Debug)]
pub(crate) struct Entry<S> {
    pub(crate) id: SocketId,
    pub(crate) stream: PrefixedStream<S>,
    pub(crate) state: SocketState,
    pub(crate) created_at: Instant,
    pub(crate) last_validated: Instant,
    pub(crate) checkouts: u64,
}

impl<S> Entry<S> {
    /// Wrap a freshly established stream, checked out
    pub(crate) fn new(stream: PrefixedStream<S>) -> Self {
        let now = Instant::now();
        Entry {
            id: SocketId::next(),
            stream,
            state: SocketState::InUse,
            created_at: now,
            last_validated: now,
            checkouts: 1,
        }
    }

    /// Record a successful liveness check
    pub(crate) fn mark_validated(&mut self) {
        self.last_validated = Instant::now();
    }

    /// Transition to `state`; `Closed` sticks
    pub(crate) fn set_state(&mut self, state: SocketState) {
        if self.state != SocketState::Closed {
            self.state = state;
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state == SocketState::Closed
    }

    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl<S: AsyncWrite + Unpin> Entry<S> {
    /// Mark closed and shut the transport down
    pub(crate) async fn close(mut self) {
        self.state = SocketState::Closed;
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, self.stream.shutdown()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_socket_ids_are_unique() {
        let a = SocketId::next();
        let b = SocketId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_socket_id_display() {
        assert_eq!(SocketId(42).to_string(), "#42");
    }

    #[test]
    fn test_entry_new_is_in_use() {
        let entry = Entry::new(PrefixedStream::plain(0u8));
        assert_eq!(entry.state, SocketState::InUse);
        assert_eq!(entry.checkouts, 1);
        assert!(entry.age() < Duration::from_secs(1));
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut entry = Entry::new(PrefixedStream::plain(0u8));
        entry.set_state(SocketState::Idle);
        assert_eq!(entry.state, SocketState::Idle);

        entry.set_state(SocketState::Closed);
        entry.set_state(SocketState::InUse);
        assert!(entry.is_closed());
    }

    #[test]
    fn test_mark_validated() {
        let mut entry = Entry::new(PrefixedStream::plain(0u8));
        let before = entry.last_validated;

        std::thread::sleep(Duration::from_millis(1));
        entry.mark_validated();

        assert!(entry.last_validated > before);
    }

    #[tokio::test]
    async fn test_close_shuts_down_stream() {
        let (client, mut server) = duplex(64);
        let entry = Entry::new(PrefixedStream::plain(client));

        entry.close().await;

        let mut buf = Vec::new();
        let n = tokio::io::AsyncReadExt::read_to_end(&mut server, &mut buf)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
