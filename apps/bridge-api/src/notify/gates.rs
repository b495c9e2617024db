//! Per-channel send/skip decisions.
//!
//! Each gate combines the payload's force flag, `skip_preferences`, the
//! channel's enable flag, the type-specific preference, and contact
//! identifier presence. The SMS consent gate is absolute: no flag
//! combination can bypass it.

use super::payload::{NotificationPayload, NotificationType};
use super::prefs::UserNotificationProfile;

/// Type-category preference for this notification type.
fn type_preference(notification_type: NotificationType, profile: &UserNotificationProfile) -> bool {
    use NotificationType::*;
    match notification_type {
        MatchReminder | MatchResult | MatchCancelled | MatchRescheduled => profile.match_reminders,
        RsvpReminder | RsvpConfirmed => profile.rsvp_reminders,
        TeamUpdate | TeamRosterChange => profile.team_updates,
        LeagueAnnouncement | AdminAnnouncement => profile.announcements,
        DirectMessage => profile.dm_notifications,
        StandingsUpdate | System | Welcome | SubRequest | SubFilled => true,
    }
}

/// In-app records are created unless explicitly skipped.
pub fn should_send_in_app(payload: &NotificationPayload) -> bool {
    payload.force_in_app != Some(false)
}

pub fn should_send_push(payload: &NotificationPayload, profile: &UserNotificationProfile) -> bool {
    if payload.force_push == Some(false) {
        return false;
    }
    if profile.fcm_tokens.is_empty() {
        return false;
    }
    if payload.force_push == Some(true) || payload.skip_preferences {
        return true;
    }
    if !profile.push_enabled {
        return false;
    }
    type_preference(payload.notification_type, profile)
}

pub fn should_send_email(payload: &NotificationPayload, profile: &UserNotificationProfile) -> bool {
    if payload.force_email == Some(false) {
        return false;
    }
    if profile.email.is_none() {
        return false;
    }
    if payload.force_email == Some(true) || payload.skip_preferences {
        return true;
    }
    if !profile.email_enabled {
        return false;
    }
    type_preference(payload.notification_type, profile)
}

pub fn should_send_sms(payload: &NotificationPayload, profile: &UserNotificationProfile) -> bool {
    if payload.force_sms == Some(false) {
        return false;
    }

    // Legal gate: verified phone and recorded consent, no exceptions.
    // Routine gating, not a fault — logged at debug level only.
    if profile.phone.is_none() {
        return false;
    }
    if !profile.is_phone_verified {
        tracing::debug!("SMS skipped: phone not verified");
        return false;
    }
    if !profile.sms_consent_given {
        tracing::debug!("SMS skipped: consent not given");
        return false;
    }

    if payload.force_sms == Some(true) || payload.skip_preferences {
        return true;
    }
    if !profile.sms_enabled {
        return false;
    }
    type_preference(payload.notification_type, profile)
}

pub fn should_send_discord(
    payload: &NotificationPayload,
    profile: &UserNotificationProfile,
) -> bool {
    if payload.force_discord == Some(false) {
        return false;
    }
    if profile.discord_id.is_none() {
        return false;
    }
    if payload.force_discord == Some(true) || payload.skip_preferences {
        return true;
    }
    if !profile.discord_enabled {
        return false;
    }
    type_preference(payload.notification_type, profile)
}
