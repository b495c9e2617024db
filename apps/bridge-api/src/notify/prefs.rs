//! Per-user notification preferences and contact data, resolved from the
//! platform's user store in one batch lookup.

use std::collections::HashMap;

use async_trait::async_trait;

use super::NotifyError;

/// Resolved channel preferences, consent state, and contact identifiers for
/// one user. Read-only from the orchestrator's perspective.
#[derive(Debug, Clone)]
pub struct UserNotificationProfile {
    // Channel enable flags.
    pub push_enabled: bool,
    pub email_enabled: bool,
    pub sms_enabled: bool,
    pub discord_enabled: bool,

    // Contact identifiers.
    pub email: Option<String>,
    pub phone: Option<String>,
    pub discord_id: Option<String>,
    pub fcm_tokens: Vec<String>,

    // SMS double-opt-in state. Both must be true for any SMS send; this is
    // a TCPA compliance requirement, not a UX preference.
    pub is_phone_verified: bool,
    pub sms_consent_given: bool,

    // Type-specific preferences.
    pub match_reminders: bool,
    pub rsvp_reminders: bool,
    pub team_updates: bool,
    pub announcements: bool,
    pub dm_notifications: bool,
}

impl Default for UserNotificationProfile {
    fn default() -> Self {
        Self {
            push_enabled: true,
            email_enabled: true,
            sms_enabled: false,
            discord_enabled: false,
            email: None,
            phone: None,
            discord_id: None,
            fcm_tokens: Vec::new(),
            is_phone_verified: false,
            sms_consent_given: false,
            match_reminders: true,
            rsvp_reminders: true,
            team_updates: true,
            announcements: true,
            dm_notifications: true,
        }
    }
}

/// Batch preference lookup. One call per `send()`, never per-user round
/// trips.
#[async_trait]
pub trait PreferenceResolver: Send + Sync {
    async fn load_profiles(
        &self,
        user_ids: &[i64],
    ) -> Result<HashMap<i64, UserNotificationProfile>, NotifyError>;
}

/// In-memory resolver for tests and fixtures.
pub struct MemoryPreferenceResolver {
    profiles: HashMap<i64, UserNotificationProfile>,
}

impl MemoryPreferenceResolver {
    pub fn new(profiles: HashMap<i64, UserNotificationProfile>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl PreferenceResolver for MemoryPreferenceResolver {
    async fn load_profiles(
        &self,
        user_ids: &[i64],
    ) -> Result<HashMap<i64, UserNotificationProfile>, NotifyError> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}
