//! Sync session and coordinator states
//!
//! All of these live in memory only. After a restart the coordinator is
//! `Idle` regardless of what it was doing; the durable queue carries
//! correctness, not the session.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::connectivity::ConnectivityState;

/// Re-entrancy guard for drain cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSessionState {
    /// No drain cycle running
    #[default]
    Idle,
    /// A drain cycle is dispatching operations
    Draining,
}

impl SyncSessionState {
    /// Returns true while a drain cycle runs
    pub fn is_draining(&self) -> bool {
        matches!(self, SyncSessionState::Draining)
    }
}

impl Display for SyncSessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SyncSessionState::Idle => write!(f, "idle"),
            SyncSessionState::Draining => write!(f, "draining"),
        }
    }
}

/// State of the sync coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CoordinatorState {
    /// Waiting for a trigger
    #[default]
    Idle,
    /// Processing a queue snapshot
    Draining,
    /// A transient failure stopped the last cycle; automatic triggers wait
    /// until the deadline passes
    Backoff {
        /// Earliest time the next automatic cycle may start
        until: DateTime<Utc>,
    },
}

impl CoordinatorState {
    /// Projects the coordinator state onto the session guard
    pub fn session(&self) -> SyncSessionState {
        match self {
            CoordinatorState::Draining => SyncSessionState::Draining,
            CoordinatorState::Idle | CoordinatorState::Backoff { .. } => SyncSessionState::Idle,
        }
    }

    /// Returns the backoff deadline if one is active at `now`
    pub fn backoff_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CoordinatorState::Backoff { until } if *until > now => Some(*until),
            _ => None,
        }
    }
}

impl Display for CoordinatorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "idle"),
            CoordinatorState::Draining => write!(f, "draining"),
            CoordinatorState::Backoff { until } => {
                write!(f, "backoff until {}", until.format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }
}

/// Single status badge value shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncIndicator {
    /// No connectivity
    Offline,
    /// A drain cycle is running
    Syncing,
    /// Local changes await sync
    Pending,
    /// Everything is reconciled
    Synced,
}

impl SyncIndicator {
    /// Derives the indicator; offline wins over syncing, which wins over pending
    pub fn derive(
        connectivity: ConnectivityState,
        session: SyncSessionState,
        pending_count: u64,
    ) -> Self {
        if !connectivity.is_online() {
            SyncIndicator::Offline
        } else if session.is_draining() {
            SyncIndicator::Syncing
        } else if pending_count > 0 {
            SyncIndicator::Pending
        } else {
            SyncIndicator::Synced
        }
    }

    /// Short human label
    pub fn label(&self) -> &'static str {
        match self {
            SyncIndicator::Offline => "Offline",
            SyncIndicator::Syncing => "Syncing...",
            SyncIndicator::Pending => "Pending sync",
            SyncIndicator::Synced => "Synced",
        }
    }
}

impl Display for SyncIndicator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_coordinator_session_projection() {
        assert_eq!(CoordinatorState::Idle.session(), SyncSessionState::Idle);
        assert_eq!(
            CoordinatorState::Draining.session(),
            SyncSessionState::Draining
        );
        let backoff = CoordinatorState::Backoff { until: Utc::now() };
        assert_eq!(backoff.session(), SyncSessionState::Idle);
    }

    #[test]
    fn test_backoff_until_expires() {
        let now = Utc::now();
        let state = CoordinatorState::Backoff {
            until: now + Duration::seconds(4),
        };
        assert!(state.backoff_until(now).is_some());
        assert!(state.backoff_until(now + Duration::seconds(4)).is_none());
        assert!(CoordinatorState::Idle.backoff_until(now).is_none());
    }

    #[test]
    fn test_indicator_precedence() {
        use ConnectivityState::*;
        use SyncSessionState::*;

        assert_eq!(SyncIndicator::derive(Offline, Draining, 3), SyncIndicator::Offline);
        assert_eq!(SyncIndicator::derive(Online, Draining, 3), SyncIndicator::Syncing);
        assert_eq!(SyncIndicator::derive(Online, Idle, 3), SyncIndicator::Pending);
        assert_eq!(SyncIndicator::derive(Online, Idle, 0), SyncIndicator::Synced);
        assert_eq!(SyncIndicator::Pending.to_string(), "Pending sync");
    }
}
