//! Management endpoints for the RSVP bridge: stats, event inspection,
//! forced reconnects, manual room joins, and WebSocket-vs-REST auditing.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::AppState;

/// How many recent events the comparison endpoint scans per match.
const COMPARE_SCAN: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/events/recent", get(recent_events))
        .route("/connection/reconnect", post(reconnect))
        .route("/matches/{match_id}/join", post(join_match))
        .route("/validation/compare/{match_id}", get(compare))
        .route("/health", get(bridge_health))
}

// ---------------------------------------------------------------------------
// GET /api/websocket/stats
// ---------------------------------------------------------------------------

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.bridge.get_stats();
    Json(serde_json::json!({
        "status": "success",
        "message": "WebSocket statistics retrieved",
        "stats": stats,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/websocket/events/recent?limit=N
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<serde_json::Value> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let events = state.bridge.event_log().recent(limit);

    Json(serde_json::json!({
        "status": "success",
        "message": format!("Retrieved {} recent WebSocket events", events.len()),
        "total_events": events.len(),
        "events": events,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/websocket/connection/reconnect
// ---------------------------------------------------------------------------

async fn reconnect(State(state): State<AppState>) -> Json<serde_json::Value> {
    tracing::info!("forced reconnect requested");
    state.bridge.disconnect();
    let success = state.bridge.connect().await;

    if success {
        Json(serde_json::json!({
            "status": "success",
            "message": "WebSocket reconnection successful",
        }))
    } else {
        Json(serde_json::json!({
            "status": "failed",
            "message": "WebSocket reconnection failed",
        }))
    }
}

// ---------------------------------------------------------------------------
// POST /api/websocket/matches/{match_id}/join
// ---------------------------------------------------------------------------

async fn join_match(
    State(state): State<AppState>,
    Path(match_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.bridge.is_connected() {
        return Err(ApiError::service_unavailable("WebSocket not connected"));
    }

    let success = state.bridge.join_match(match_id, None);
    let (status, message) = if success {
        (
            "success",
            format!("Successfully joined WebSocket room for match {match_id}"),
        )
    } else {
        (
            "failed",
            format!("Failed to join WebSocket room for match {match_id}"),
        )
    };

    Ok(Json(serde_json::json!({
        "status": status,
        "message": message,
        "match_id": match_id,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/websocket/validation/compare/{match_id}
// ---------------------------------------------------------------------------

async fn compare(
    State(state): State<AppState>,
    Path(match_id): Path<i64>,
) -> Json<serde_json::Value> {
    let match_events = state.bridge.event_log().for_match(match_id, COMPARE_SCAN);

    // REST failures are reported inside the body so the comparison is still
    // useful when the web UI is down.
    let url = format!(
        "{}/api/get_match_rsvps/{}",
        state.config.webui_api_url, match_id
    );
    let rest_data = match state.http.get(&url).send().await {
        Ok(response) if response.status().is_success() => response
            .json::<serde_json::Value>()
            .await
            .unwrap_or_else(|e| serde_json::json!({ "error": format!("Invalid JSON: {e}") })),
        Ok(response) => serde_json::json!({ "error": format!("HTTP {}", response.status()) }),
        Err(e) => serde_json::json!({ "error": format!("Connection failed: {e}") }),
    };

    let rest_accessible = rest_data.get("error").is_none();
    let last_event = match_events.last().cloned();

    Json(serde_json::json!({
        "status": "success",
        "match_id": match_id,
        "websocket_event_count": match_events.len(),
        "websocket_events": match_events,
        "rest_api_data": rest_data,
        "comparison": {
            "websocket_has_events": last_event.is_some(),
            "rest_api_accessible": rest_accessible,
            "last_websocket_event": last_event,
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /api/websocket/health
// ---------------------------------------------------------------------------

async fn bridge_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.bridge.get_stats();
    let (status, message) = if stats.connected {
        ("healthy", "WebSocket connection active")
    } else {
        ("unhealthy", "WebSocket connection inactive")
    };

    Json(serde_json::json!({
        "status": status,
        "message": message,
        "details": {
            "connected": stats.connected,
            "active_matches": stats.active_matches,
            "events_received": stats.events_received,
            "events_processed": stats.events_processed,
            "last_event_time": stats.last_event_time,
        },
    }))
}
