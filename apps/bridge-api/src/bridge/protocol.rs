//! Wire-format messages exchanged with the web backend over WebSocket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// RSVP answer states. The backend sends these as lowercase strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Yes,
    No,
    Maybe,
    NoResponse,
}

/// Which system produced an RSVP change. Used to suppress our own echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Discord,
    Web,
    Mobile,
    #[serde(other)]
    Unknown,
}

impl EventSource {
    /// True if the event originated from this bridge's own side.
    pub fn is_self(self) -> bool {
        matches!(self, EventSource::Discord)
    }
}

/// Aggregate RSVP counts for a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpCounts {
    #[serde(default)]
    pub yes: u32,
    #[serde(default)]
    pub no: u32,
    #[serde(default)]
    pub maybe: u32,
}

/// Summary block inside a `joined_match_rsvp` acknowledgment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RsvpSummary {
    #[serde(default)]
    pub yes_count: u32,
    #[serde(default)]
    pub no_count: u32,
    #[serde(default)]
    pub maybe_count: u32,
}

/// Current RSVP state returned when joining a room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsvpSnapshot {
    #[serde(default)]
    pub summary: RsvpSummary,
}

/// An unsolicited RSVP change pushed by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RsvpUpdate {
    pub match_id: i64,
    #[serde(default)]
    pub player_id: Option<i64>,
    #[serde(default)]
    pub player_name: Option<String>,
    pub availability: Availability,
    pub source: EventSource,
    #[serde(default)]
    pub team_id: Option<i64>,
    /// Event time as stamped by the backend.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Client → Server frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Authentication payload sent immediately after the transport opens.
    Auth {
        #[serde(rename = "type")]
        client_type: String,
        api_key: String,
    },
    /// Subscribe to a match room.
    JoinMatchRsvp {
        match_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        team_id: Option<i64>,
    },
    /// Unsubscribe from a match room (fire-and-forget).
    LeaveMatchRsvp { match_id: i64 },
}

// ---------------------------------------------------------------------------
// Server → Client frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    AuthenticationSuccess {
        #[serde(default)]
        message: Option<String>,
    },
    AuthenticationFailed {
        #[serde(default)]
        error: Option<String>,
    },
    JoinedMatchRsvp {
        match_id: i64,
        #[serde(default)]
        current_rsvps: RsvpSnapshot,
        #[serde(default)]
        match_info: Option<Value>,
    },
    RsvpUpdate(RsvpUpdate),
    RsvpSummary {
        match_id: i64,
        #[serde(default)]
        rsvp_counts: RsvpCounts,
    },
}
