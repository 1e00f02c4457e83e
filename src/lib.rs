//! studio-notify: real-time notification sync client for the Studio
//! video-production platform.
//!
//! Layers, in dependency order: a push transport adapter (reconnecting
//! WebSocket), a reducer-driven notification store, a REST client over the
//! notification resource, and a session orchestrator tying them together.
//! The store is the single source of truth; transport and API only reach
//! it through dispatched actions.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;
pub mod sync;
pub mod transport;
