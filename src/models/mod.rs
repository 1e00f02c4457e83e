pub mod connection;
pub mod envelope;
pub mod notification;

pub use connection::ConnectionStatus;
pub use envelope::{ApiEnvelope, Pagination};
pub use notification::{Notification, NotificationId, NotificationKind, PushAck, PushNotification};
