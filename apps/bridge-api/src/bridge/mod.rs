//! Real-time RSVP synchronization bridge between this process and the web
//! backend. The bridge's local state is a cache of recent activity, not a
//! source of truth: authoritative RSVP counts always come from the backend.

pub mod client;
pub mod embed;
pub mod event_log;
pub mod protocol;
pub mod registry;
