//! Notification payload types and the convenience constructors used by the
//! rest of the platform. Constructors only build payloads; all channel
//! gating lives in the orchestrator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    // Match-related
    MatchReminder,
    MatchResult,
    MatchCancelled,
    MatchRescheduled,
    // RSVP-related
    RsvpReminder,
    RsvpConfirmed,
    // Team-related
    TeamUpdate,
    TeamRosterChange,
    // League-related
    LeagueAnnouncement,
    StandingsUpdate,
    // Admin/System
    AdminAnnouncement,
    System,
    Welcome,
    // Substitute-related
    SubRequest,
    SubFilled,
    // Direct messaging
    DirectMessage,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::MatchReminder => "match_reminder",
            NotificationType::MatchResult => "match_result",
            NotificationType::MatchCancelled => "match_cancelled",
            NotificationType::MatchRescheduled => "match_rescheduled",
            NotificationType::RsvpReminder => "rsvp_reminder",
            NotificationType::RsvpConfirmed => "rsvp_confirmed",
            NotificationType::TeamUpdate => "team_update",
            NotificationType::TeamRosterChange => "team_roster_change",
            NotificationType::LeagueAnnouncement => "league_announcement",
            NotificationType::StandingsUpdate => "standings_update",
            NotificationType::AdminAnnouncement => "admin_announcement",
            NotificationType::System => "system",
            NotificationType::Welcome => "welcome",
            NotificationType::SubRequest => "sub_request",
            NotificationType::SubFilled => "sub_filled",
            NotificationType::DirectMessage => "direct_message",
        }
    }

    /// Default in-app icon class for this type.
    pub fn default_icon(self) -> &'static str {
        match self {
            NotificationType::MatchReminder => "ti ti-calendar-event",
            NotificationType::MatchResult => "ti ti-trophy",
            NotificationType::MatchCancelled => "ti ti-calendar-off",
            NotificationType::MatchRescheduled => "ti ti-calendar-stats",
            NotificationType::RsvpReminder => "ti ti-clipboard-check",
            NotificationType::RsvpConfirmed => "ti ti-check",
            NotificationType::TeamUpdate => "ti ti-users",
            NotificationType::TeamRosterChange => "ti ti-user-plus",
            NotificationType::LeagueAnnouncement => "ti ti-speakerphone",
            NotificationType::StandingsUpdate => "ti ti-chart-bar",
            NotificationType::AdminAnnouncement => "ti ti-bell-ringing",
            NotificationType::System => "ti ti-info-circle",
            NotificationType::Welcome => "ti ti-confetti",
            NotificationType::SubRequest => "ti ti-hand-stop",
            NotificationType::SubFilled => "ti ti-user-check",
            NotificationType::DirectMessage => "ti ti-message-circle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// Immutable notification payload; `send()` never mutates it.
///
/// Force flags are tri-state: `Some(true)`/`Some(false)` short-circuit the
/// channel decision, `None` means "respect user preferences".
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub user_ids: Vec<i64>,
    /// Extra key/value context for deep links.
    pub data: HashMap<String, String>,
    pub icon: Option<String>,
    pub priority: Priority,

    pub force_push: Option<bool>,
    pub force_in_app: Option<bool>,
    pub force_email: Option<bool>,
    pub force_sms: Option<bool>,
    pub force_discord: Option<bool>,
    /// Bypass preference checks for critical sends. Never overrides the
    /// SMS consent gate.
    pub skip_preferences: bool,

    pub email_subject: Option<String>,
    pub email_html_body: Option<String>,
    /// Call-to-action URL included in email/SMS/Discord bodies.
    pub action_url: Option<String>,
}

impl NotificationPayload {
    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        user_ids: Vec<i64>,
    ) -> Self {
        Self {
            notification_type,
            title: title.into(),
            message: message.into(),
            user_ids,
            data: HashMap::new(),
            icon: None,
            priority: Priority::Normal,
            force_push: None,
            force_in_app: None,
            force_email: None,
            force_sms: None,
            force_discord: None,
            skip_preferences: false,
            email_subject: None,
            email_html_body: None,
            action_url: None,
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn icon(&self) -> &str {
        self.icon
            .as_deref()
            .unwrap_or_else(|| self.notification_type.default_icon())
    }

    // -----------------------------------------------------------------------
    // Convenience constructors
    // -----------------------------------------------------------------------

    pub fn match_reminder(
        match_id: i64,
        user_ids: Vec<i64>,
        opponent: &str,
        match_time: &str,
        location: &str,
        hours_until: u32,
    ) -> Self {
        let message = if hours_until <= 2 {
            let plural = if hours_until == 1 { "" } else { "s" };
            format!("Your match against {opponent} starts in {hours_until} hour{plural}!")
        } else {
            format!("Your match against {opponent} is tomorrow at {match_time}")
        };
        let priority = if hours_until <= 2 {
            Priority::High
        } else {
            Priority::Normal
        };

        Self::new(NotificationType::MatchReminder, "Match Reminder", message, user_ids)
            .with_data("match_id", match_id.to_string())
            .with_data("opponent", opponent)
            .with_data("location", location)
            .with_data("match_time", match_time)
            .with_priority(priority)
    }

    pub fn rsvp_reminder(
        match_id: i64,
        user_ids: Vec<i64>,
        opponent: &str,
        match_date: &str,
        days_until: u32,
    ) -> Self {
        let urgency = if days_until <= 1 { "URGENT: " } else { "" };
        let message = format!("{urgency}Please RSVP for your match against {opponent} on {match_date}");
        let priority = if days_until <= 1 {
            Priority::High
        } else {
            Priority::Normal
        };

        Self::new(NotificationType::RsvpReminder, "RSVP Needed", message, user_ids)
            .with_data("match_id", match_id.to_string())
            .with_data("opponent", opponent)
            .with_data("match_date", match_date)
            .with_priority(priority)
    }

    pub fn match_result(
        match_id: i64,
        user_ids: Vec<i64>,
        home_team: &str,
        away_team: &str,
        home_score: u32,
        away_score: u32,
        user_team_won: Option<bool>,
    ) -> Self {
        let score = format!("{home_score}-{away_score}");
        let (title, message) = match user_team_won {
            Some(true) => (
                "Victory!",
                format!("Congratulations! Final score: {home_team} {score} {away_team}"),
            ),
            Some(false) => (
                "Match Result",
                format!("Match ended: {home_team} {score} {away_team}"),
            ),
            None => (
                "Match Result",
                format!("Final score: {home_team} {score} {away_team}"),
            ),
        };

        Self::new(NotificationType::MatchResult, title, message, user_ids)
            .with_data("match_id", match_id.to_string())
            .with_data("home_team", home_team)
            .with_data("away_team", away_team)
            .with_data("score", score)
    }

    pub fn admin_announcement(
        user_ids: Vec<i64>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(NotificationType::AdminAnnouncement, title, message, user_ids)
    }

    pub fn welcome(user_id: i64, username: &str) -> Self {
        let mut payload = Self::new(
            NotificationType::Welcome,
            "Welcome to the league!",
            format!(
                "Hey {username}! Your account is all set up. Explore the app to find your team and matches."
            ),
            vec![user_id],
        );
        payload.force_in_app = Some(true);
        payload.force_push = Some(true);
        payload.skip_preferences = true;
        payload
    }

    pub fn sub_request(
        match_id: i64,
        user_ids: Vec<i64>,
        team_name: &str,
        match_date: &str,
        position: Option<&str>,
    ) -> Self {
        let pos_text = position.map(|p| format!(" ({p})")).unwrap_or_default();
        let message = format!("{team_name} needs a sub{pos_text} for their match on {match_date}");

        Self::new(NotificationType::SubRequest, "Sub Needed", message, user_ids)
            .with_data("match_id", match_id.to_string())
            .with_data("team_name", team_name)
            .with_data("match_date", match_date)
            .with_data("position", position.unwrap_or(""))
            .with_priority(Priority::High)
    }

    pub fn direct_message(
        recipient_id: i64,
        sender_id: i64,
        sender_name: &str,
        message_preview: &str,
    ) -> Self {
        let preview = if message_preview.chars().count() > 50 {
            let truncated: String = message_preview.chars().take(47).collect();
            format!("{truncated}...")
        } else {
            message_preview.to_string()
        };

        Self::new(
            NotificationType::DirectMessage,
            sender_name,
            preview,
            vec![recipient_id],
        )
        .with_data("sender_id", sender_id.to_string())
        .with_data("sender_name", sender_name)
        .with_data("deep_link", format!("ecs-fc-scheme://messages/{sender_id}"))
        .with_priority(Priority::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_forces_critical_channels() {
        let payload = NotificationPayload::welcome(7, "Jess");
        assert!(payload.skip_preferences);
        assert_eq!(payload.force_in_app, Some(true));
        assert_eq!(payload.force_push, Some(true));
        assert_eq!(payload.user_ids, vec![7]);
        // Never force SMS — consent rules stay in charge.
        assert_eq!(payload.force_sms, None);
    }

    #[test]
    fn urgent_reminders_get_high_priority() {
        let soon = NotificationPayload::match_reminder(1, vec![1], "Sounders", "7pm", "Field 4", 1);
        assert_eq!(soon.priority, Priority::High);
        assert!(soon.message.contains("in 1 hour!"));

        let tomorrow =
            NotificationPayload::match_reminder(1, vec![1], "Sounders", "7pm", "Field 4", 24);
        assert_eq!(tomorrow.priority, Priority::Normal);
    }

    #[test]
    fn direct_message_preview_is_truncated() {
        let long = "x".repeat(80);
        let payload = NotificationPayload::direct_message(1, 2, "Sam", &long);
        assert_eq!(payload.message.chars().count(), 50);
        assert!(payload.message.ends_with("..."));
    }

    #[test]
    fn icon_falls_back_to_type_default() {
        let payload = NotificationPayload::admin_announcement(vec![1], "Heads up", "Fields closed");
        assert_eq!(payload.icon(), "ti ti-bell-ringing");
    }
}
