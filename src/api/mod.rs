pub mod client;

pub use client::{ListQuery, NotificationApi, SortDirection};
