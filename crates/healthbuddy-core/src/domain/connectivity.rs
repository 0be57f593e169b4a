//! Connectivity state

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Process-wide network reachability as reported by the host platform
///
/// Not persisted; initialized from the platform at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    /// The remote is believed reachable
    Online,
    /// No network path to the remote
    Offline,
}

impl ConnectivityState {
    /// Maps a platform `is_online` boolean onto a state
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    /// Returns true when online
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

impl Display for ConnectivityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
        }
    }
}
