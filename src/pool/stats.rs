//! Pool statistics
//!
//! Monotonic counters plus a point-in-time view of the pool's occupancy.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Statistics for the connection pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Sockets dialed (and tunneled, if proxying) successfully
    pub total_created: AtomicUsize,
    /// Acquisitions served from an idle socket
    pub total_reused: AtomicUsize,
    /// Sockets put back into the idle set
    pub total_returned: AtomicUsize,
    /// Sockets closed instead of being kept
    pub total_discarded: AtomicUsize,
    /// Failed transport connects
    pub connect_failures: AtomicUsize,
    /// Failed proxy handshakes
    pub handshake_failures: AtomicUsize,
}

impl PoolStats {
    /// Create new pool stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new socket
    pub fn record_created(&self) {
        self.total_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an idle socket handed out again
    pub fn record_reused(&self) {
        self.total_reused.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a socket returned to idle
    pub fn record_returned(&self) {
        self.total_returned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a socket that was closed
    pub fn record_discarded(&self) {
        self.total_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed connect
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed handshake
    pub fn record_handshake_failure(&self) {
        self.handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current stats snapshot
    pub fn snapshot(&self, in_use: usize, idle: usize) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_discarded: self.total_discarded.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            handshake_failures: self.handshake_failures.load(Ordering::Relaxed),
            in_use,
            idle,
        }
    }
}

/// Snapshot of pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Sockets dialed
    pub total_created: usize,
    /// Idle sockets handed out again
    pub total_reused: usize,
    /// Sockets released back to idle
    pub total_returned: usize,
    /// Sockets closed instead of pooled
    pub total_discarded: usize,
    /// Failed dials
    pub connect_failures: usize,
    /// Failed CONNECT handshakes
    pub handshake_failures: usize,
    /// Sockets checked out right now
    pub in_use: usize,
    /// Sockets idle right now
    pub idle: usize,
}

impl PoolStatsSnapshot {
    /// Log pool health status
    pub fn log_health(&self, key: &impl std::fmt::Display) {
        debug!(
            "Pool {} health: in_use={}, idle={}, created={}, reused={}, returned={}, discarded={}, connect_failures={}, handshake_failures={}",
            key,
            self.in_use,
            self.idle,
            self.total_created,
            self.total_reused,
            self.total_returned,
            self.total_discarded,
            self.connect_failures,
            self.handshake_failures
        );
    }
}
