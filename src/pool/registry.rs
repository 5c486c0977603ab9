//! Shared pool bookkeeping
//!
//! The idle set and the checked-out table are the only pool-wide mutable
//! state. Both live behind one mutex that is never held across an await.

use super::socket::{Entry, SocketId, SocketState};
use super::stats::PoolStats;
use crate::error::PoolError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct RegistryState<S> {
    idle: VecDeque<Entry<S>>,
    checked_out: HashMap<SocketId, SocketState>,
    closed: bool,
}

/// Idle sockets and checkout table of one pool
#[derive(Debug)]
pub(crate) struct Registry<S> {
    state: Mutex<RegistryState<S>>,
    pub(crate) stats: PoolStats,
}

impl<S> Registry<S> {
    pub(crate) fn new() -> Self {
        Registry {
            state: Mutex::new(RegistryState {
                idle: VecDeque::new(),
                checked_out: HashMap::new(),
                closed: false,
            }),
            stats: PoolStats::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the most recently returned idle socket
    pub(crate) fn pop_idle(&self) -> Result<Option<Entry<S>>, PoolError> {
        let mut state = self.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        Ok(state.idle.pop_back())
    }

    /// Register `entry` as checked out
    ///
    /// Fails with the entry handed back if the pool was torn down meanwhile.
    pub(crate) fn check_out(&self, mut entry: Entry<S>) -> Result<Entry<S>, Entry<S>> {
        let mut state = self.lock();
        if state.closed {
            return Err(entry);
        }
        entry.set_state(SocketState::InUse);
        state.checked_out.insert(entry.id, SocketState::InUse);
        Ok(entry)
    }

    /// Remove `id` from the checkout table, returning the state it had
    pub(crate) fn check_in(&self, id: SocketId) -> Option<SocketState> {
        self.lock().checked_out.remove(&id)
    }

    /// Put an entry back into the idle set
    pub(crate) fn push_idle(&self, mut entry: Entry<S>) -> Result<(), Entry<S>> {
        let mut state = self.lock();
        if state.closed || entry.is_closed() {
            return Err(entry);
        }
        entry.set_state(SocketState::Idle);
        state.idle.push_back(entry);
        Ok(())
    }

    /// Mark the pool closed and take every idle socket out
    ///
    /// Checked-out sockets are marked `Closed`; they are closed when their
    /// holder releases or drops them.
    pub(crate) fn close(&self) -> Vec<Entry<S>> {
        let mut state = self.lock();
        state.closed = true;
        for socket_state in state.checked_out.values_mut() {
            *socket_state = SocketState::Closed;
        }
        state.idle.drain(..).collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of sockets currently checked out and not torn down
    pub(crate) fn in_use(&self) -> usize {
        self.lock()
            .checked_out
            .values()
            .filter(|state| **state == SocketState::InUse)
            .count()
    }

    pub(crate) fn idle(&self) -> usize {
        self.lock().idle.len()
    }
}
