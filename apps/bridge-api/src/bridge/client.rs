//! Resilient WebSocket client bridging the bot process to the web backend.
//!
//! Maintains an authenticated, auto-reconnecting duplex channel, keeps the
//! room registry consistent across reconnects, and routes inbound RSVP
//! events to the embed update adapter. Backend unavailability must never
//! block the Discord-side path: every transport call degrades to a logged
//! warning and a `false` return.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::embed::EmbedUpdateAdapter;
use super::event_log::{EventLog, RsvpEvent};
use super::protocol::{ClientFrame, RsvpCounts, RsvpUpdate, ServerFrame};
use super::registry::RoomRegistry;

/// How often the supervisor polls connection health.
const SUPERVISOR_INTERVAL: Duration = Duration::from_secs(30);

/// Transport-level connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Snapshot of bridge counters for the management surface.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStats {
    pub connected: bool,
    pub connection_attempts: u64,
    pub events_received: u64,
    pub events_processed: u64,
    pub active_matches: usize,
    pub last_event_time: Option<DateTime<Utc>>,
    pub total_logged_events: usize,
}

pub struct RsvpBridge {
    ws_url: String,
    api_key: String,
    registry: RoomRegistry,
    event_log: EventLog,
    adapter: EmbedUpdateAdapter,

    connected: AtomicBool,
    connection_attempts: AtomicU64,
    events_received: AtomicU64,
    events_processed: AtomicU64,
    last_event_time: Mutex<Option<DateTime<Utc>>>,

    /// Sender side of the writer task. `None` while disconnected.
    writer: Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>,
}

impl RsvpBridge {
    pub fn new(ws_url: String, api_key: String, adapter: EmbedUpdateAdapter) -> Self {
        Self {
            ws_url,
            api_key,
            registry: RoomRegistry::new(),
            event_log: EventLog::new(),
            adapter,
            connected: AtomicBool::new(false),
            connection_attempts: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            last_event_time: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn get_stats(&self) -> BridgeStats {
        BridgeStats {
            connected: self.is_connected(),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            active_matches: self.registry.len(),
            last_event_time: *self.last_event_time.lock(),
            total_logged_events: self.event_log.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Open the transport and authenticate. Idempotent; never panics or
    /// propagates transport errors to the caller.
    pub async fn connect(self: &Arc<Self>) -> bool {
        if self.is_connected() {
            tracing::debug!("already connected to backend WebSocket");
            return true;
        }

        let attempt = self.connection_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(url = %self.ws_url, attempt, "connecting to backend WebSocket");

        let mut request = match self.ws_url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "invalid backend WebSocket URL");
                return false;
            }
        };
        match HeaderValue::from_str(&self.api_key) {
            Ok(value) => {
                request.headers_mut().insert("X-API-Key", value);
            }
            Err(e) => {
                tracing::error!(error = %e, "API key is not a valid header value");
                return false;
            }
        }

        let stream = match time::timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(request),
        )
        .await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to connect to backend WebSocket");
                return false;
            }
            Err(_) => {
                tracing::error!("backend WebSocket connect timed out");
                return false;
            }
        };

        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientFrame>();

        // Writer task: owns the sink, serializes outbound frames.
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize outbound frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        self.install_writer(tx);
        tracing::info!(attempt, "connected to backend WebSocket");

        self.emit(ClientFrame::Auth {
            client_type: "discord-bot".to_string(),
            api_key: self.api_key.clone(),
        });

        // Reader task: routes inbound frames until the stream ends.
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                        Ok(frame) => bridge.handle_frame(frame).await,
                        Err(e) => tracing::debug!(error = %e, "ignoring unrecognized frame"),
                    },
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!(error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
            bridge.mark_disconnected();
            tracing::warn!("disconnected from backend WebSocket");
        });

        // Recover subscriptions lost during the outage. Room membership
        // must survive reconnection.
        self.rejoin_active_rooms();

        true
    }

    /// Close the transport and clear in-memory room state.
    pub fn disconnect(&self) {
        if self.is_connected() {
            tracing::info!("disconnecting from backend WebSocket");
        }
        self.mark_disconnected();
        self.registry.clear();
    }

    fn install_writer(&self, tx: mpsc::UnboundedSender<ClientFrame>) {
        *self.writer.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.writer.lock() = None;
    }

    /// Queue a frame for the writer task. Returns `false` when disconnected.
    fn emit(&self, frame: ClientFrame) -> bool {
        let guard = self.writer.lock();
        match guard.as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Background supervisor: retries the connection forever, with bounded
    /// exponential backoff while the backend is unreachable.
    pub fn spawn_supervisor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            let mut backoff = BACKOFF_INITIAL;
            loop {
                if bridge.is_connected() {
                    backoff = BACKOFF_INITIAL;
                    time::sleep(SUPERVISOR_INTERVAL).await;
                    continue;
                }

                tracing::info!("attempting backend WebSocket reconnect");
                if bridge.connect().await {
                    backoff = BACKOFF_INITIAL;
                    time::sleep(SUPERVISOR_INTERVAL).await;
                } else {
                    time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Room membership
    // -----------------------------------------------------------------------

    /// Request subscription to a match room. Does not wait for the
    /// `joined_match_rsvp` acknowledgment.
    pub fn join_match(&self, match_id: i64, team_id: Option<i64>) -> bool {
        if !self.is_connected() {
            tracing::warn!(match_id, "cannot join match room: not connected");
            return false;
        }

        tracing::info!(match_id, "joining match RSVP room");
        if !self.emit(ClientFrame::JoinMatchRsvp { match_id, team_id }) {
            tracing::warn!(match_id, "failed to queue join request");
            return false;
        }
        true
    }

    /// Join several match rooms at once (scheduler startup path).
    pub fn join_active_matches(&self, match_ids: &[i64]) -> usize {
        if !self.is_connected() {
            tracing::warn!("cannot join match rooms: not connected");
            return 0;
        }

        let joined = match_ids
            .iter()
            .filter(|id| self.join_match(**id, None))
            .count();
        tracing::info!(joined, requested = match_ids.len(), "joined match RSVP rooms");
        joined
    }

    /// Join a room right after an RSVP prompt was posted externally, and
    /// track it with the posted-message flag set.
    pub fn join_match_on_rsvp_post(&self, match_id: i64) -> bool {
        if !self.is_connected() {
            tracing::warn!(match_id, "cannot join room after RSVP post: not connected");
            return false;
        }

        if !self.join_match(match_id, None) {
            tracing::error!(match_id, "failed to join room after RSVP post");
            return false;
        }

        self.registry.insert_posted(match_id, Utc::now());
        tracing::info!(match_id, "joined room after RSVP message posted");
        self.sweep_rooms();
        true
    }

    fn rejoin_active_rooms(&self) {
        let match_ids = self.registry.match_ids();
        if match_ids.is_empty() {
            return;
        }

        tracing::info!(rooms = match_ids.len(), "rejoining match rooms after reconnect");
        let joined = match_ids
            .iter()
            .filter(|id| self.join_match(**id, None))
            .count();
        tracing::info!(joined, total = match_ids.len(), "rejoined match rooms");
    }

    /// Evict stale rooms and send best-effort leave requests for them.
    fn sweep_rooms(&self) {
        let evicted = self.registry.sweep(Utc::now());
        if evicted.is_empty() {
            return;
        }

        for match_id in &evicted {
            if !self.emit(ClientFrame::LeaveMatchRsvp { match_id: *match_id }) {
                tracing::warn!(match_id, "failed to send leave for evicted room");
            }
        }

        tracing::info!(
            evicted = evicted.len(),
            remaining = self.registry.len(),
            "cleaned up old match rooms"
        );
    }

    // -----------------------------------------------------------------------
    // Inbound routing
    // -----------------------------------------------------------------------

    async fn handle_frame(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::AuthenticationSuccess { message } => {
                tracing::info!(message = message.as_deref().unwrap_or("OK"), "WebSocket authenticated");
            }
            ServerFrame::AuthenticationFailed { error } => {
                // Visible in logs and health, but the supervisor keeps
                // retrying: the key may be fixed live.
                tracing::error!(
                    error = error.as_deref().unwrap_or("unknown"),
                    "WebSocket authentication failed"
                );
            }
            ServerFrame::JoinedMatchRsvp {
                match_id,
                current_rsvps,
                match_info: _,
            } => {
                let summary = current_rsvps.summary;
                tracing::info!(
                    match_id,
                    yes = summary.yes_count,
                    no = summary.no_count,
                    maybe = summary.maybe_count,
                    "joined match RSVP room"
                );
                if !self.registry.contains(match_id) {
                    self.registry.insert_joined(match_id, Utc::now());
                }
                self.registry.record_summary(
                    match_id,
                    RsvpCounts {
                        yes: summary.yes_count,
                        no: summary.no_count,
                        maybe: summary.maybe_count,
                    },
                );
            }
            ServerFrame::RsvpUpdate(update) => self.handle_rsvp_update(update).await,
            ServerFrame::RsvpSummary {
                match_id,
                rsvp_counts,
            } => {
                tracing::info!(
                    match_id,
                    yes = rsvp_counts.yes,
                    no = rsvp_counts.no,
                    maybe = rsvp_counts.maybe,
                    "RSVP summary update"
                );
                self.registry.record_summary(match_id, rsvp_counts);
            }
        }
    }

    /// Core inbound handler: log, auto-join, update room stats, and forward
    /// non-self-sourced events to the embed adapter.
    async fn handle_rsvp_update(&self, update: RsvpUpdate) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        *self.last_event_time.lock() = Some(now);

        let event = RsvpEvent {
            match_id: update.match_id,
            player_id: update.player_id,
            player_name: update
                .player_name
                .clone()
                .unwrap_or_else(|| "Unknown Player".to_string()),
            availability: update.availability,
            source: update.source,
            team_id: update.team_id,
            timestamp: update.timestamp,
            received_at: now,
        };
        self.event_log.append(event.clone());

        // Auto-join-on-observe: events can arrive for matches the backend
        // started tracking before our own scheduler did.
        if !self.registry.contains(update.match_id) {
            tracing::info!(match_id = update.match_id, "new match observed: auto-joining room");
            // Best effort; the entry is tracked either way so the room is
            // rejoined on the next reconnect.
            self.join_match(update.match_id, update.team_id);
            self.registry.insert_auto_joined(update.match_id, now);
            self.sweep_rooms();
        }

        self.registry.record_event(update.match_id, now);

        tracing::info!(
            match_id = update.match_id,
            player = %event.player_name,
            availability = ?event.availability,
            source = ?event.source,
            "RSVP update received"
        );

        // Loop prevention: never re-broadcast our own echoes.
        if update.source.is_self() {
            tracing::debug!(match_id = update.match_id, "ignoring self-sourced update");
            return;
        }

        match self.adapter.refresh_match(update.match_id, &event).await {
            Ok(_updated) => {
                self.events_processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(match_id = update.match_id, error = %e, "embed refresh failed");
            }
        }
    }
}
