//! Connection status of the push transport.
//!
//! This is the one real state machine in the client:
//! `Disconnected(attempts)` → `Connecting` → `Connected(since)`, with any
//! transport failure dropping back to `Disconnected(attempts + 1)` and an
//! explicit `disconnect()` resetting to `Disconnected(0)`.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected { attempts: u32 },
    Connecting,
    Connected { since: DateTime<Utc> },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Consecutive failed reconnect attempts. Zero unless disconnected.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Disconnected { attempts } => *attempts,
            _ => 0,
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected { attempts: 0 }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected { attempts: 0 } => write!(f, "disconnected"),
            Self::Disconnected { attempts } => {
                write!(f, "disconnected ({} failed attempts)", attempts)
            }
            Self::Connecting => write!(f, "connecting"),
            Self::Connected { since } => write!(f, "connected since {}", since.to_rfc3339()),
        }
    }
}
