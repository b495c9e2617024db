//! Single entry point for all outbound user notifications.
//!
//! `send()` resolves every target's preferences in one batch, evaluates the
//! per-channel gates, batches push delivery, and isolates per-recipient
//! failures for the other channels. The input payload is never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::gates;
use super::payload::{NotificationPayload, NotificationType};
use super::prefs::PreferenceResolver;
use super::senders::{
    build_discord_body, build_email_html, build_sms_body, DiscordDmSender, EmailSender,
    InAppStore, PushSender, SmsSender,
};

/// Per-channel delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub success: u32,
    pub failure: u32,
    pub skipped: u32,
}

/// Aggregated result of one `send()` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub in_app: ChannelOutcome,
    pub push: ChannelOutcome,
    pub email: ChannelOutcome,
    pub sms: ChannelOutcome,
    pub discord: ChannelOutcome,
    pub total_users: usize,
}

pub struct NotificationOrchestrator {
    prefs: Arc<dyn PreferenceResolver>,
    in_app: Arc<dyn InAppStore>,
    push: Arc<dyn PushSender>,
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
    discord: Arc<dyn DiscordDmSender>,
}

impl NotificationOrchestrator {
    pub fn new(
        prefs: Arc<dyn PreferenceResolver>,
        in_app: Arc<dyn InAppStore>,
        push: Arc<dyn PushSender>,
        email: Arc<dyn EmailSender>,
        sms: Arc<dyn SmsSender>,
        discord: Arc<dyn DiscordDmSender>,
    ) -> Self {
        Self {
            prefs,
            in_app,
            push,
            email,
            sms,
            discord,
        }
    }

    pub async fn send(&self, payload: &NotificationPayload) -> DeliveryReport {
        let mut report = DeliveryReport {
            total_users: payload.user_ids.len(),
            ..Default::default()
        };

        if payload.user_ids.is_empty() {
            tracing::warn!("no target users for notification");
            return report;
        }

        // One batch lookup, never per-user round trips.
        let profiles = match self.prefs.load_profiles(&payload.user_ids).await {
            Ok(profiles) => profiles,
            Err(e) => {
                tracing::error!(error = %e, "failed to resolve notification preferences");
                return report;
            }
        };

        let icon = payload.icon().to_string();

        // All counters below are per user. Targets with no resolvable
        // profile count as skipped on every channel.

        // In-app records, independent of the other channels.
        for user_id in &payload.user_ids {
            if profiles.get(user_id).is_none() {
                report.in_app.skipped += 1;
                continue;
            }
            if gates::should_send_in_app(payload) {
                match self.in_app.create(*user_id, payload, &icon).await {
                    Ok(()) => report.in_app.success += 1,
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "in-app notification failed");
                        report.in_app.failure += 1;
                    }
                }
            } else {
                report.in_app.skipped += 1;
            }
        }

        // Push, batched: one sender call for all eligible tokens.
        let push_user_ids: Vec<i64> = payload
            .user_ids
            .iter()
            .copied()
            .filter(|id| {
                profiles
                    .get(id)
                    .is_some_and(|profile| gates::should_send_push(payload, profile))
            })
            .collect();
        let tokens: Vec<String> = push_user_ids
            .iter()
            .filter_map(|id| profiles.get(id))
            .flat_map(|profile| profile.fcm_tokens.iter().cloned())
            .collect();

        if !tokens.is_empty() {
            let data = self.push_data(payload);
            match self
                .push
                .send_batch(&tokens, &payload.title, &payload.message, &data)
                .await
            {
                Ok(outcome) => {
                    // Token-level failures are logged; the report stays
                    // per user like the other channels.
                    if outcome.failure > 0 {
                        tracing::warn!(
                            failed_tokens = outcome.failure,
                            sent_tokens = outcome.success,
                            "some push tokens were rejected"
                        );
                    }
                    report.push.success = push_user_ids.len() as u32;
                }
                Err(e) => {
                    tracing::error!(error = %e, "push batch failed");
                    report.push.failure = push_user_ids.len() as u32;
                }
            }
        }
        report.push.skipped = (payload.user_ids.len() - push_user_ids.len()) as u32;

        // Email, per recipient; one failure never aborts the batch.
        for user_id in &payload.user_ids {
            let Some(profile) = profiles.get(user_id) else {
                report.email.skipped += 1;
                continue;
            };
            if gates::should_send_email(payload, profile) {
                let Some(email) = profile.email.as_deref() else {
                    report.email.skipped += 1;
                    continue;
                };
                let subject = payload.email_subject.as_deref().unwrap_or(&payload.title);
                let html = payload
                    .email_html_body
                    .clone()
                    .unwrap_or_else(|| build_email_html(payload));
                match self.email.send(email, subject, &html).await {
                    Ok(()) => report.email.success += 1,
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "email delivery failed");
                        report.email.failure += 1;
                    }
                }
            } else {
                report.email.skipped += 1;
            }
        }

        // SMS, per recipient, behind the consent gate.
        for user_id in &payload.user_ids {
            let Some(profile) = profiles.get(user_id) else {
                report.sms.skipped += 1;
                continue;
            };
            if gates::should_send_sms(payload, profile) {
                let Some(phone) = profile.phone.as_deref() else {
                    report.sms.skipped += 1;
                    continue;
                };
                let body = build_sms_body(payload);
                match self
                    .sms
                    .send(phone, &body, *user_id, payload.notification_type.as_str())
                    .await
                {
                    Ok(()) => report.sms.success += 1,
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "sms delivery failed");
                        report.sms.failure += 1;
                    }
                }
            } else {
                report.sms.skipped += 1;
            }
        }

        // Discord DMs, per recipient.
        for user_id in &payload.user_ids {
            let Some(profile) = profiles.get(user_id) else {
                report.discord.skipped += 1;
                continue;
            };
            if gates::should_send_discord(payload, profile) {
                let Some(discord_id) = profile.discord_id.as_deref() else {
                    report.discord.skipped += 1;
                    continue;
                };
                let body = build_discord_body(payload);
                match self.discord.send(discord_id, &body).await {
                    Ok(()) => report.discord.success += 1,
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "discord dm delivery failed");
                        report.discord.failure += 1;
                    }
                }
            } else {
                report.discord.skipped += 1;
            }
        }

        tracing::info!(
            notification_type = payload.notification_type.as_str(),
            total_users = report.total_users,
            in_app = report.in_app.success,
            push = report.push.success,
            email = report.email.success,
            sms = report.sms.success,
            discord = report.discord.success,
            "notification dispatched"
        );

        report
    }

    /// Build the push data map: type/priority/timestamp, payload context,
    /// and a deep link when a match id is present.
    fn push_data(&self, payload: &NotificationPayload) -> HashMap<String, String> {
        let mut data = HashMap::new();
        data.insert("type".to_string(), payload.notification_type.as_str().to_string());
        data.insert("timestamp".to_string(), Utc::now().timestamp().to_string());
        data.insert("priority".to_string(), payload.priority.as_str().to_string());

        for (key, value) in &payload.data {
            data.insert(key.clone(), value.clone());
        }

        if let Some(match_id) = data.get("match_id").cloned() {
            if !data.contains_key("deep_link") {
                let deep_link = if payload.notification_type == NotificationType::RsvpReminder {
                    format!("ecs-fc-scheme://rsvp/{match_id}")
                } else {
                    format!("ecs-fc-scheme://match/{match_id}")
                };
                data.insert("deep_link".to_string(), deep_link);
            }
        }

        data
    }
}
