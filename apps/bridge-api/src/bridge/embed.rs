//! Embed update adapter: turns a routed RSVP event into a refresh of the
//! externally visible RSVP message(s) for that match.
//!
//! Lookup and update are injected capabilities so the bridge never depends
//! on Discord REST semantics directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::event_log::RsvpEvent;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("message lookup failed: {0}")]
    Lookup(String),
    #[error("embed update failed: {0}")]
    Update(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Resolves the external message identifiers posted for a match.
///
/// Returning an empty list is a normal no-op: the match has no posted
/// RSVP prompt yet.
#[async_trait]
pub trait RsvpMessageLookup: Send + Sync {
    async fn message_ids(&self, match_id: i64) -> Result<Vec<String>, EmbedError>;
}

/// Refreshes one externally visible RSVP message to current state.
#[async_trait]
pub trait EmbedUpdater: Send + Sync {
    async fn update_message(&self, message_id: &str) -> Result<(), EmbedError>;
}

pub struct EmbedUpdateAdapter {
    lookup: Arc<dyn RsvpMessageLookup>,
    updater: Arc<dyn EmbedUpdater>,
}

impl EmbedUpdateAdapter {
    pub fn new(lookup: Arc<dyn RsvpMessageLookup>, updater: Arc<dyn EmbedUpdater>) -> Self {
        Self { lookup, updater }
    }

    /// Refresh every posted message for `match_id`. Per-message failures are
    /// isolated; returns the number of successful updates.
    pub async fn refresh_match(
        &self,
        match_id: i64,
        event: &RsvpEvent,
    ) -> Result<usize, EmbedError> {
        let message_ids = self.lookup.message_ids(match_id).await?;

        if message_ids.is_empty() {
            tracing::debug!(match_id, "no posted RSVP messages for match");
            return Ok(0);
        }

        let mut updated = 0;
        for message_id in &message_ids {
            match self.updater.update_message(message_id).await {
                Ok(()) => updated += 1,
                Err(e) => {
                    tracing::error!(match_id, %message_id, error = %e, "embed update failed");
                }
            }
        }

        if updated > 0 {
            tracing::info!(
                match_id,
                updated,
                player = %event.player_name,
                availability = ?event.availability,
                "refreshed RSVP embeds"
            );
        }

        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// HTTP-backed implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MessageIdsResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Resolves message ids from the web backend's match-message index.
pub struct HttpRsvpMessageLookup {
    http: reqwest::Client,
    webui_url: String,
}

impl HttpRsvpMessageLookup {
    pub fn new(http: reqwest::Client, webui_url: String) -> Self {
        Self { http, webui_url }
    }
}

#[async_trait]
impl RsvpMessageLookup for HttpRsvpMessageLookup {
    async fn message_ids(&self, match_id: i64) -> Result<Vec<String>, EmbedError> {
        let url = format!("{}/api/get_message_ids/{match_id}", self.webui_url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(EmbedError::Lookup(format!(
                "backend returned {} for match {match_id}",
                response.status()
            )));
        }

        let body: MessageIdsResponse = response.json().await?;
        Ok(body.message_ids)
    }
}

/// Triggers an embed refresh through the bot's REST API.
pub struct HttpEmbedUpdater {
    http: reqwest::Client,
    bot_api_url: String,
}

impl HttpEmbedUpdater {
    pub fn new(http: reqwest::Client, bot_api_url: String) -> Self {
        Self { http, bot_api_url }
    }
}

#[async_trait]
impl EmbedUpdater for HttpEmbedUpdater {
    async fn update_message(&self, message_id: &str) -> Result<(), EmbedError> {
        let url = format!("{}/api/update_embed", self.bot_api_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "message_id": message_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbedError::Update(format!(
                "bot API returned {} for message {message_id}",
                response.status()
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test doubles shared with the bridge client tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::bridge::protocol::{Availability, EventSource};
    use chrono::Utc;

    fn sample_event() -> RsvpEvent {
        RsvpEvent {
            match_id: 42,
            player_id: Some(1),
            player_name: "Jess".into(),
            availability: Availability::Yes,
            source: EventSource::Web,
            team_id: None,
            timestamp: None,
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_lookup_is_a_noop() {
        let updater = Arc::new(RecordingUpdater::default());
        let adapter = EmbedUpdateAdapter::new(Arc::new(FixedLookup(vec![])), updater.clone());

        let updated = adapter.refresh_match(42, &sample_event()).await.unwrap();
        assert_eq!(updated, 0);
        assert!(updater.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn one_failing_update_does_not_block_others() {
        let updater = Arc::new(RecordingUpdater {
            calls: Default::default(),
            fail_for: vec!["m2".into()],
        });
        let lookup = FixedLookup(vec!["m1".into(), "m2".into(), "m3".into()]);
        let adapter = EmbedUpdateAdapter::new(Arc::new(lookup), updater.clone());

        let updated = adapter.refresh_match(42, &sample_event()).await.unwrap();
        assert_eq!(updated, 2);
        assert_eq!(updater.calls.lock().len(), 3);
    }
}
