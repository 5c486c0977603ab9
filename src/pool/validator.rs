//! Connection validator
//!
//! Cheap liveness check run before an idle socket is handed out and
//! before a released socket is kept.

use super::socket::{Entry, SocketState};
use crate::transport::Transport;
use std::time::Duration;
use tracing::debug;

/// Whether `entry` can still be used.
///
/// Never consumes application data and returns within about `timeout`.
/// A socket that fails the check is marked `Closed`.
pub(crate) async fn is_usable<T: Transport>(
    transport: &T,
    entry: &mut Entry<T::Stream>,
    timeout: Duration,
) -> bool {
    if entry.is_closed() {
        return false;
    }

    let liveness = transport.probe(entry.stream.get_ref(), timeout).await;
    if liveness.is_alive() {
        entry.mark_validated();
        true
    } else {
        debug!("Socket {} failed liveness check: {:?}", entry.id, liveness);
        entry.set_state(SocketState::Closed);
        false
    }
}
