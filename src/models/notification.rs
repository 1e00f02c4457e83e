//! Notification records as served by the Studio notification resource,
//! plus the transient shapes used on the push channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────

/// Identifier for a notification entry.
///
/// Persisted records carry a server-assigned UUID. Entries that arrived over
/// the push channel have not been persisted from this client's point of view
/// yet, so they carry a throwaway millisecond-timestamp id until the next
/// authoritative list fetch replaces them wholesale. A `Local` id never
/// leaves the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationId {
    Server(Uuid),
    Local(i64),
}

impl NotificationId {
    /// Mint a local (unconfirmed) id from the current wall clock.
    pub fn local_now() -> Self {
        Self::Local(Utc::now().timestamp_millis())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The server UUID, if this entry has been confirmed.
    pub fn server_id(&self) -> Option<Uuid> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Local(_) => None,
        }
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{}", id),
            Self::Local(ms) => write!(f, "local-{}", ms),
        }
    }
}

// ── Notification kind ─────────────────────────────────────────

/// The fixed set of notification types emitted by the workflow backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    UrgentFixRequest,
    FixCompleted,
    AssignmentCreated,
    AssignmentCancelled,
    StatusChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrgentFixRequest => "URGENT_FIX_REQUEST",
            Self::FixCompleted => "FIX_COMPLETED",
            Self::AssignmentCreated => "ASSIGNMENT_CREATED",
            Self::AssignmentCancelled => "ASSIGNMENT_CANCELLED",
            Self::StatusChanged => "STATUS_CHANGED",
        }
    }
}

// ── Records ───────────────────────────────────────────────────

/// A notification as held in the client store.
///
/// Invariant: `read_at` is `Some` if and only if `is_read` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// The video this notification refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub sender_id: String,
    pub recipient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

/// A pushed real-time event, before the server-assigned id is known.
///
/// Pushed events are always unread on arrival; read state and the durable
/// id only exist server-side and are picked up by the reconciliation fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub sender_id: String,
    pub recipient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PushNotification {
    /// Convert into an unconfirmed store entry with a freshly minted local id.
    pub fn into_unconfirmed(self) -> Notification {
        Notification {
            id: NotificationId::local_now(),
            kind: self.kind,
            title: self.title,
            message: self.message,
            video_id: self.video_id,
            customer_name: self.customer_name,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            previous_status: self.previous_status,
            new_status: self.new_status,
            is_read: false,
            created_at: self.created_at,
            read_at: None,
        }
    }
}

/// Outbound best-effort acknowledgement published after a push is decoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
}

// ── Tests ─────────────────────────────────────────────────────
