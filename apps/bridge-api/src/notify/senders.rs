//! Channel delivery capabilities consumed by the orchestrator.
//!
//! Email, SMS, and push transports are external collaborators and stay
//! behind traits; the Discord DM sender gets a concrete HTTP impl because
//! the bot exposes it over plain HTTP.

use std::collections::HashMap;

use async_trait::async_trait;

use super::payload::NotificationPayload;
use super::NotifyError;

/// TCPA-required opt-out language appended to every SMS.
const SMS_OPT_OUT_SUFFIX: &str = "\nReply STOP to opt out.";

/// Maximum SMS body length including the opt-out suffix.
const SMS_MAX_LEN: usize = 320;

/// Result of one batched push call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOutcome {
    pub success: u32,
    pub failure: u32,
}

/// Batched push delivery: one call for all recipient tokens.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send_batch(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &HashMap<String, String>,
    ) -> Result<PushOutcome, NotifyError>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(
        &self,
        phone: &str,
        body: &str,
        user_id: i64,
        message_type: &str,
    ) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait DiscordDmSender: Send + Sync {
    async fn send(&self, discord_id: &str, message: &str) -> Result<(), NotifyError>;
}

/// Creates the in-app notification record for one user.
#[async_trait]
pub trait InAppStore: Send + Sync {
    async fn create(
        &self,
        user_id: i64,
        payload: &NotificationPayload,
        icon: &str,
    ) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// Body builders
// ---------------------------------------------------------------------------

/// Build the SMS body: title + message + optional action URL, truncated to
/// fit the length budget, always ending with the opt-out suffix.
pub fn build_sms_body(payload: &NotificationPayload) -> String {
    let mut body = format!("{}\n{}", payload.title, payload.message);
    if let Some(url) = &payload.action_url {
        body.push_str(&format!("\nDetails: {url}"));
    }

    let max_content = SMS_MAX_LEN - SMS_OPT_OUT_SUFFIX.len();
    if body.chars().count() > max_content {
        let truncated: String = body.chars().take(max_content - 3).collect();
        body = format!("{truncated}...");
    }

    body.push_str(SMS_OPT_OUT_SUFFIX);
    body
}

/// Build the Discord DM body (markdown).
pub fn build_discord_body(payload: &NotificationPayload) -> String {
    let mut body = format!("**{}**\n\n{}", payload.title, payload.message);
    if let Some(url) = &payload.action_url {
        body.push_str(&format!("\n\n[View Details]({url})"));
    }
    body
}

/// Build a plain HTML email body when the payload doesn't carry a custom one.
pub fn build_email_html(payload: &NotificationPayload) -> String {
    let message_html = payload.message.replace('\n', "<br>");
    let action_button = payload
        .action_url
        .as_ref()
        .map(|url| format!(r#"<p><a href="{url}">View Details</a></p>"#))
        .unwrap_or_default();

    format!(
        "<html><body>\
         <h2>{title}</h2>\
         <div>{message_html}</div>\
         {action_button}\
         <p><small>You can manage your notification preferences in your account settings.</small></p>\
         </body></html>",
        title = payload.title,
    )
}

// ---------------------------------------------------------------------------
// HTTP Discord DM sender (bot API)
// ---------------------------------------------------------------------------

pub struct HttpDiscordDmSender {
    http: reqwest::Client,
    bot_api_url: String,
}

impl HttpDiscordDmSender {
    pub fn new(http: reqwest::Client, bot_api_url: String) -> Self {
        Self { http, bot_api_url }
    }
}

#[async_trait]
impl DiscordDmSender for HttpDiscordDmSender {
    async fn send(&self, discord_id: &str, message: &str) -> Result<(), NotifyError> {
        let url = format!("{}/api/send_dm", self.bot_api_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "user_id": discord_id,
                "message": message,
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(format!("discord dm request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "bot API returned {} for discord dm",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::payload::NotificationType;

    fn payload(message: &str) -> NotificationPayload {
        NotificationPayload::new(NotificationType::SubRequest, "Sub Needed", message, vec![1])
    }

    #[test]
    fn sms_body_always_ends_with_opt_out() {
        let body = build_sms_body(&payload("short message"));
        assert!(body.ends_with(SMS_OPT_OUT_SUFFIX));
        assert!(body.starts_with("Sub Needed\nshort message"));
    }

    #[test]
    fn sms_body_is_truncated_to_budget() {
        let long = "a".repeat(500);
        let body = build_sms_body(&payload(&long));
        assert!(body.chars().count() <= SMS_MAX_LEN);
        assert!(body.contains("..."));
        assert!(body.ends_with(SMS_OPT_OUT_SUFFIX));
    }

    #[test]
    fn sms_body_includes_action_url() {
        let mut p = payload("msg");
        p.action_url = Some("https://example.com/m/1".to_string());
        let body = build_sms_body(&p);
        assert!(body.contains("Details: https://example.com/m/1"));
    }

    #[test]
    fn discord_body_uses_markdown_title() {
        let mut p = payload("come play");
        p.action_url = Some("https://example.com/m/1".to_string());
        let body = build_discord_body(&p);
        assert!(body.starts_with("**Sub Needed**\n\ncome play"));
        assert!(body.contains("[View Details](https://example.com/m/1)"));
    }

    #[test]
    fn email_html_escapes_newlines() {
        let body = build_email_html(&payload("line one\nline two"));
        assert!(body.contains("line one<br>line two"));
    }
}
