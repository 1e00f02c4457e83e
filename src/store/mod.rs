//! Notification store: the single source of truth for the client session.
//!
//! Wraps the pure reducer in an owned, constructible container. The
//! transport adapter and the API client never touch the state directly;
//! they dispatch actions, each applied atomically, and every subscriber
//! observes the resulting snapshot through a watch channel. Any number of
//! independent subscribers is supported.

pub mod reducer;

use std::sync::Mutex;

use tokio::sync::watch;

pub use reducer::{reduce, Action, NotificationState, MAX_ITEMS};

pub struct NotificationStore {
    state: Mutex<NotificationState>,
    tx: watch::Sender<NotificationState>,
}

impl NotificationStore {
    pub fn new() -> Self {
        let initial = NotificationState::default();
        let (tx, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            tx,
        }
    }

    /// Apply one action and broadcast the new snapshot. Returns the snapshot.
    pub fn dispatch(&self, action: Action) -> NotificationState {
        let next = {
            let mut state = self.state.lock().expect("store mutex poisoned");
            let next = reduce(&state, &action);
            *state = next.clone();
            next
        };
        // Receivers may all be gone; dispatching is still valid.
        let _ = self.tx.send(next.clone());
        next
    }

    pub fn snapshot(&self) -> NotificationState {
        self.state.lock().expect("store mutex poisoned").clone()
    }

    /// Subscribe to state snapshots. Every subscriber sees every committed
    /// state independently of the others.
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.tx.subscribe()
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────
