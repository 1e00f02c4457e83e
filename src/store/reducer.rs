//! Pure state transitions for the notification aggregate.
//!
//! `reduce` is deterministic and side-effect free: timestamps for read
//! stamping travel inside the action, never pulled from the clock here, so
//! identical `(state, action)` pairs always yield identical results.

use chrono::{DateTime, Utc};

use crate::models::{ConnectionStatus, Notification, NotificationId};

/// The local list is capped to the most recent entries; the authoritative
/// set lives server-side and the unread counter is reconciled against the
/// server-computed count.
pub const MAX_ITEMS: usize = 50;

// ── State ─────────────────────────────────────────────────────

/// The client-side notification aggregate. Mutated only through `reduce`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationState {
    /// Newest first, at most `MAX_ITEMS` entries.
    pub items: Vec<Notification>,
    /// Unread count of the full authoritative set, not just the local window.
    pub unread_count: u64,
    pub loading: bool,
    pub error: Option<String>,
    pub connection: ConnectionStatus,
}

// ── Actions ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetLoading(bool),
    SetError(Option<String>),
    /// Wholesale overwrite after an authoritative fetch. Clears loading and
    /// error; any unconfirmed (local-id) entries are discarded with the rest.
    ReplaceList(Vec<Notification>),
    /// Insert a pushed entry at the head, truncating to `MAX_ITEMS`.
    PrependOne(Notification),
    /// Replace the entry with a matching id in place. No-op on no match.
    UpdateOne(Notification),
    /// Delete the entry with a matching id. No-op on no match.
    RemoveOne(NotificationId),
    SetUnreadCount(u64),
    SetConnection(ConnectionStatus),
    /// Mark a single entry read, stamping `read_at`. The counter decrement
    /// is gated on an unread entry actually matching.
    MarkOneRead {
        id: NotificationId,
        read_at: DateTime<Utc>,
    },
    MarkAllRead {
        read_at: DateTime<Utc>,
    },
    /// Back to the zero-value aggregate (session teardown).
    Reset,
}

// ── Reducer ───────────────────────────────────────────────────

pub fn reduce(state: &NotificationState, action: &Action) -> NotificationState {
    let mut next = state.clone();

    match action {
        Action::SetLoading(loading) => {
            next.loading = *loading;
        }
        Action::SetError(error) => {
            next.error = error.clone();
            next.loading = false;
        }
        Action::ReplaceList(items) => {
            next.items = items.clone();
            next.loading = false;
            next.error = None;
        }
        Action::PrependOne(entry) => {
            if !entry.is_read {
                next.unread_count += 1;
            }
            next.items.insert(0, entry.clone());
            next.items.truncate(MAX_ITEMS);
        }
        Action::UpdateOne(entry) => {
            if let Some(slot) = next.items.iter_mut().find(|n| n.id == entry.id) {
                *slot = entry.clone();
            }
        }
        Action::RemoveOne(id) => {
            if let Some(pos) = next.items.iter().position(|n| n.id == *id) {
                let removed = next.items.remove(pos);
                if !removed.is_read {
                    next.unread_count = next.unread_count.saturating_sub(1);
                }
            }
        }
        Action::SetUnreadCount(count) => {
            next.unread_count = *count;
        }
        Action::SetConnection(status) => {
            next.connection = *status;
        }
        Action::MarkOneRead { id, read_at } => {
            if let Some(slot) = next.items.iter_mut().find(|n| n.id == *id && !n.is_read) {
                slot.is_read = true;
                slot.read_at = Some(*read_at);
                next.unread_count = next.unread_count.saturating_sub(1);
            }
        }
        Action::MarkAllRead { read_at } => {
            for n in &mut next.items {
                n.is_read = true;
                n.read_at = Some(*read_at);
            }
            next.unread_count = 0;
        }
        Action::Reset => {
            next = NotificationState::default();
        }
    }

    next
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;
    use uuid::Uuid;

    fn entry(id: NotificationId, is_read: bool) -> Notification {
        Notification {
            id,
            kind: NotificationKind::StatusChanged,
            title: "status changed".into(),
            message: "video moved to review".into(),
            video_id: Some("vid-1".into()),
            customer_name: None,
            sender_id: "staff-1".into(),
            recipient_id: "editor-1".into(),
            previous_status: None,
            new_status: None,
            is_read,
            created_at: Utc::now(),
            read_at: if is_read { Some(Utc::now()) } else { None },
        }
    }

    fn server_id() -> NotificationId {
        NotificationId::Server(Uuid::new_v4())
    }

    #[test]
    fn prepend_caps_list_at_max_items() {
        let mut state = NotificationState::default();
        for _ in 0..(MAX_ITEMS + 10) {
            state = reduce(&state, &Action::PrependOne(entry(server_id(), false)));
        }
        assert_eq!(state.items.len(), MAX_ITEMS);
        assert_eq!(state.unread_count, (MAX_ITEMS + 10) as u64);
    }

    #[test]
    fn prepend_drops_oldest_first() {
        let oldest = entry(server_id(), false);
        let mut state = reduce(&NotificationState::default(), &Action::PrependOne(oldest.clone()));
        for _ in 0..MAX_ITEMS {
            state = reduce(&state, &Action::PrependOne(entry(server_id(), false)));
        }
        assert!(!state.items.iter().any(|n| n.id == oldest.id));
    }

    #[test]
    fn prepend_read_entry_leaves_counter_alone() {
        let state = reduce(
            &NotificationState::default(),
            &Action::PrependOne(entry(server_id(), true)),
        );
        assert_eq!(state.unread_count, 0);
    }

    #[test]
    fn replace_list_clears_loading_and_error() {
        let mut state = NotificationState {
            loading: true,
            error: Some("previous failure".into()),
            ..Default::default()
        };
        let items = vec![entry(server_id(), false), entry(server_id(), true)];
        state = reduce(&state, &Action::ReplaceList(items.clone()));
        assert_eq!(state.items, items);
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn remove_unread_decrements_counter_by_one() {
        let target = entry(server_id(), false);
        let mut state = NotificationState::default();
        state = reduce(&state, &Action::PrependOne(target.clone()));
        state = reduce(&state, &Action::PrependOne(entry(server_id(), false)));
        assert_eq!(state.unread_count, 2);

        state = reduce(&state, &Action::RemoveOne(target.id));
        assert_eq!(state.unread_count, 1);
        assert_eq!(state.items.len(), 1);
    }

    #[test]
    fn remove_read_entry_keeps_counter() {
        let target = entry(server_id(), true);
        let mut state = reduce(&NotificationState::default(), &Action::PrependOne(target.clone()));
        state = reduce(&state, &Action::RemoveOne(target.id));
        assert_eq!(state.unread_count, 0);
        assert!(state.items.is_empty());
    }

    #[test]
    fn remove_missing_id_is_a_noop() {
        let mut state = reduce(
            &NotificationState::default(),
            &Action::PrependOne(entry(server_id(), false)),
        );
        let before = state.clone();
        state = reduce(&state, &Action::RemoveOne(server_id()));
        assert_eq!(state, before);
    }

    #[test]
    fn counter_never_goes_negative() {
        let target = entry(server_id(), false);
        let mut state = reduce(&NotificationState::default(), &Action::PrependOne(target.clone()));
        state = reduce(&state, &Action::SetUnreadCount(0));
        state = reduce(&state, &Action::RemoveOne(target.id));
        assert_eq!(state.unread_count, 0);
    }

    #[test]
    fn mark_one_read_stamps_read_at_and_decrements() {
        let target = entry(server_id(), false);
        let mut state = reduce(&NotificationState::default(), &Action::PrependOne(target.clone()));
        assert_eq!(state.unread_count, 1);

        let read_at = Utc::now();
        state = reduce(&state, &Action::MarkOneRead { id: target.id, read_at });
        assert_eq!(state.unread_count, 0);
        let marked = &state.items[0];
        assert!(marked.is_read);
        assert_eq!(marked.read_at, Some(read_at));
    }

    #[test]
    fn mark_one_read_on_missing_id_does_not_decrement() {
        // The source dashboard decremented unconditionally here; that was a
        // bug and the decrement is gated on an unread match instead.
        let mut state = reduce(
            &NotificationState::default(),
            &Action::PrependOne(entry(server_id(), false)),
        );
        let before = state.clone();
        state = reduce(
            &state,
            &Action::MarkOneRead { id: server_id(), read_at: Utc::now() },
        );
        assert_eq!(state, before);
    }

    #[test]
    fn mark_one_read_twice_decrements_once() {
        let target = entry(server_id(), false);
        let mut state = reduce(&NotificationState::default(), &Action::PrependOne(target.clone()));
        state = reduce(&state, &Action::SetUnreadCount(5));
        state = reduce(&state, &Action::MarkOneRead { id: target.id, read_at: Utc::now() });
        state = reduce(&state, &Action::MarkOneRead { id: target.id, read_at: Utc::now() });
        assert_eq!(state.unread_count, 4);
    }

    #[test]
    fn mark_all_read_zeroes_counter_regardless_of_prior_state() {
        let mut state = NotificationState::default();
        for _ in 0..5 {
            state = reduce(&state, &Action::PrependOne(entry(server_id(), false)));
        }
        state = reduce(&state, &Action::SetUnreadCount(40));

        let read_at = Utc::now();
        state = reduce(&state, &Action::MarkAllRead { read_at });
        assert_eq!(state.unread_count, 0);
        assert!(state.items.iter().all(|n| n.is_read && n.read_at == Some(read_at)));
    }

    #[test]
    fn update_one_replaces_in_place_preserving_order() {
        let a = entry(server_id(), false);
        let b = entry(server_id(), false);
        let c = entry(server_id(), false);
        let mut state = NotificationState::default();
        for n in [&c, &b, &a] {
            state = reduce(&state, &Action::PrependOne(n.clone()));
        }

        let mut updated = b.clone();
        updated.title = "edited".into();
        state = reduce(&state, &Action::UpdateOne(updated.clone()));

        assert_eq!(state.items[0].id, a.id);
        assert_eq!(state.items[1], updated);
        assert_eq!(state.items[2].id, c.id);
    }

    #[test]
    fn update_one_missing_id_is_a_noop() {
        let state = reduce(
            &NotificationState::default(),
            &Action::PrependOne(entry(server_id(), false)),
        );
        let mut ghost = entry(server_id(), true);
        ghost.title = "never stored".into();
        let next = reduce(&state, &Action::UpdateOne(ghost));
        assert_eq!(next, state);
    }

    #[test]
    fn replace_list_round_trips_input_unchanged() {
        let items = vec![
            entry(server_id(), false),
            entry(server_id(), true),
            entry(NotificationId::local_now(), false),
        ];
        let state = reduce(&NotificationState::default(), &Action::ReplaceList(items.clone()));
        assert_eq!(state.items, items);
    }

    #[test]
    fn reset_returns_zero_value_aggregate() {
        let mut state = reduce(
            &NotificationState::default(),
            &Action::PrependOne(entry(server_id(), false)),
        );
        state = reduce(&state, &Action::SetConnection(ConnectionStatus::Connecting));
        state = reduce(&state, &Action::Reset);
        assert_eq!(state, NotificationState::default());
    }

    #[test]
    fn reduce_is_deterministic() {
        let state = reduce(
            &NotificationState::default(),
            &Action::PrependOne(entry(server_id(), false)),
        );
        let action = Action::MarkAllRead { read_at: Utc::now() };
        assert_eq!(reduce(&state, &action), reduce(&state, &action));
    }

    #[test]
    fn push_then_mark_read_scenario() {
        // spec scenario: empty → push unread → count 1 → mark read → count 0
        let pushed = entry(server_id(), false);
        let mut state = NotificationState::default();
        assert_eq!(state.unread_count, 0);

        state = reduce(&state, &Action::PrependOne(pushed.clone()));
        assert_eq!(state.unread_count, 1);

        state = reduce(&state, &Action::MarkOneRead { id: pushed.id, read_at: Utc::now() });
        assert_eq!(state.unread_count, 0);
        assert!(state.items[0].read_at.is_some());
    }
}
