//! Multi-channel notification delivery.
//!
//! The orchestrator is the single entry point: it resolves preferences in
//! one batch, applies per-channel gates (including the absolute SMS consent
//! gate), and fans out to in-app, push, email, SMS, and Discord DMs.

use thiserror::Error;

pub mod gates;
pub mod orchestrator;
pub mod payload;
pub mod prefs;
pub mod senders;

pub use orchestrator::{ChannelOutcome, DeliveryReport, NotificationOrchestrator};
pub use payload::{NotificationPayload, NotificationType, Priority};
pub use prefs::{PreferenceResolver, UserNotificationProfile};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("preference lookup failed: {0}")]
    Resolver(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
