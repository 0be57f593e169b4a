//! Connectivity monitor
//!
//! Holds the current [`ConnectivityState`] and broadcasts every transition
//! over a `tokio::sync::watch` channel. The host platform (or the CLI's
//! reachability check) feeds it with [`ConnectivityMonitor::set`]; the
//! scheduler subscribes and starts a drain on each `Offline -> Online`
//! transition. Setting the state never blocks.

use std::sync::Arc;

use healthbuddy_core::domain::ConnectivityState;
use tokio::sync::watch;
use tracing::info;

/// Shared, cloneable handle to the connectivity state
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor starting in `initial`
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Returns the last reported state
    pub fn current(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    /// Returns true if the last reported state is online
    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Subscribes to transitions
    ///
    /// The receiver is notified only when the state actually changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// Reports a new state; returns true if it was a transition
    pub fn set(&self, state: ConnectivityState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            info!(connectivity = %state, "Connectivity changed");
        }
        changed
    }

    /// Convenience for hosts reporting a boolean reachability flag
    pub fn set_online(&self, online: bool) -> bool {
        self.set(ConnectivityState::from_online(online))
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectivityState::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_transitions_only() {
        let monitor = ConnectivityMonitor::default();
        assert_eq!(monitor.current(), ConnectivityState::Offline);

        assert!(monitor.set(ConnectivityState::Online));
        assert!(!monitor.set(ConnectivityState::Online));
        assert!(monitor.is_online());
        assert!(monitor.set_online(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
        let mut rx = monitor.subscribe();

        // Same state: nothing to observe
        monitor.set(ConnectivityState::Offline);
        assert!(!rx.has_changed().unwrap());

        monitor.set(ConnectivityState::Online);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectivityState::Online);
    }

    #[test]
    fn test_clones_share_state() {
        let monitor = ConnectivityMonitor::default();
        let clone = monitor.clone();
        clone.set_online(true);
        assert!(monitor.is_online());
    }
}
