//! Listener state tracking
//!
//! Tracks the listener phase and connection counters. Shared between the
//! accept loop and every close-observer task.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle phase of the listening socket
///
/// A listener that failed to bind never exists, so there is no unbound phase
/// here; bind errors surface as `ProbeError::Bind` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    /// Bound and accepting connections
    Listening,
    /// A connection closed; no further accepts
    Terminated,
}

impl ListenerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ListenerPhase::Listening,
            _ => ListenerPhase::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ListenerPhase::Listening => 0,
            ListenerPhase::Terminated => 1,
        }
    }
}

/// Shared listener state
#[derive(Debug, Clone)]
pub struct ListenerState {
    inner: Arc<ListenerStateInner>,
}

#[derive(Debug)]
struct ListenerStateInner {
    port: u16,
    phase: AtomicU8,
    accepted: AtomicU64,
    open: AtomicU64,
}

impl ListenerState {
    /// Create state for a listener bound to `port`
    pub fn new(port: u16) -> Self {
        Self {
            inner: Arc::new(ListenerStateInner {
                port,
                phase: AtomicU8::new(ListenerPhase::Listening.as_u8()),
                accepted: AtomicU64::new(0),
                open: AtomicU64::new(0),
            }),
        }
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn phase(&self) -> ListenerPhase {
        ListenerPhase::from_u8(self.inner.phase.load(Ordering::SeqCst))
    }

    /// Move to `Terminated`. Absorbing: repeated calls are no-ops.
    pub fn set_terminated(&self) {
        self.inner
            .phase
            .store(ListenerPhase::Terminated.as_u8(), Ordering::SeqCst);
    }

    /// Record an accepted connection and return its id (1-based)
    pub fn record_accept(&self) -> u64 {
        self.inner.open.fetch_add(1, Ordering::Relaxed);
        self.inner.accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a connection close
    pub fn record_close(&self) {
        // Saturating: never wrap below zero
        let _ = self
            .inner
            .open
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Total connections accepted since bind
    pub fn accepted(&self) -> u64 {
        self.inner.accepted.load(Ordering::Relaxed)
    }

    /// Connections accepted and not yet closed
    pub fn open_connections(&self) -> u64 {
        self.inner.open.load(Ordering::Relaxed)
    }

    pub fn is_listening(&self) -> bool {
        self.phase() == ListenerPhase::Listening
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_listening_with_no_connections() {
        let state = ListenerState::new(3000);
        assert_eq!(state.port(), 3000);
        assert!(state.is_listening());
        assert_eq!(state.accepted(), 0);
        assert_eq!(state.open_connections(), 0);
    }

    #[test]
    fn connection_ids_are_sequential() {
        let state = ListenerState::new(3000);
        assert_eq!(state.record_accept(), 1);
        assert_eq!(state.record_accept(), 2);
        assert_eq!(state.open_connections(), 2);

        state.record_close();
        assert_eq!(state.open_connections(), 1);
        assert_eq!(state.accepted(), 2);
    }

    #[test]
    fn open_count_does_not_underflow() {
        let state = ListenerState::new(3000);
        state.record_close();
        assert_eq!(state.open_connections(), 0);
    }

    #[test]
    fn terminated_is_absorbing() {
        let state = ListenerState::new(3000);
        state.set_terminated();
        state.set_terminated();
        assert_eq!(state.phase(), ListenerPhase::Terminated);
        assert!(!state.is_listening());
    }
}
