use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;

use bridge_api::bridge::client::RsvpBridge;
use bridge_api::bridge::embed::{EmbedUpdateAdapter, HttpEmbedUpdater, HttpRsvpMessageLookup};
use bridge_api::bridge::event_log::RsvpEvent;
use bridge_api::bridge::protocol::{Availability, EventSource};
use bridge_api::cache::{CacheStore, CircuitBreaker, DraftCache, MemoryStore};
use bridge_api::config::Config;
use bridge_api::AppState;

/// Build a server around a bridge that has never connected. The web UI URL
/// points at a closed port so REST lookups fail fast.
fn test_state() -> AppState {
    let http = reqwest::Client::new();
    let config = Config {
        webui_api_url: "http://127.0.0.1:9".to_string(),
        websocket_url: "ws://127.0.0.1:9/ws".to_string(),
        api_key: "test-key".to_string(),
        bot_api_url: "http://127.0.0.1:9".to_string(),
        redis_url: "redis://127.0.0.1:9/0".to_string(),
        port: 0,
    };

    let adapter = EmbedUpdateAdapter::new(
        Arc::new(HttpRsvpMessageLookup::new(
            http.clone(),
            config.webui_api_url.clone(),
        )),
        Arc::new(HttpEmbedUpdater::new(
            http.clone(),
            config.bot_api_url.clone(),
        )),
    );

    let bridge = Arc::new(RsvpBridge::new(
        config.websocket_url.clone(),
        config.api_key.clone(),
        adapter,
    ));

    let store: Box<dyn CacheStore> = Box::new(MemoryStore::new());
    let cache = Arc::new(DraftCache::new(store, Arc::new(CircuitBreaker::default())));

    AppState {
        bridge,
        cache,
        config: Arc::new(config),
        http,
    }
}

fn server(state: AppState) -> TestServer {
    let app = bridge_api::routes::router().with_state(state);
    TestServer::new(app).unwrap()
}

fn event(match_id: i64, player_id: i64) -> RsvpEvent {
    RsvpEvent {
        match_id,
        player_id: Some(player_id),
        player_name: format!("Player {player_id}"),
        availability: Availability::Yes,
        source: EventSource::Web,
        team_id: None,
        timestamp: None,
        received_at: Utc::now(),
    }
}

#[tokio::test]
async fn health_endpoint_is_ok() {
    let server = server(test_state());
    let resp = server.get("/health").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn stats_report_a_disconnected_bridge() {
    let server = server(test_state());
    let resp = server.get("/api/websocket/stats").await;
    resp.assert_status(StatusCode::OK);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["stats"]["connected"], false);
    assert_eq!(body["stats"]["active_matches"], 0);
    assert_eq!(body["stats"]["events_received"], 0);
}

#[tokio::test]
async fn recent_events_honors_the_limit() {
    let state = test_state();
    for i in 0..5 {
        state.bridge.event_log().append(event(100, i));
    }

    let server = server(state);
    let resp = server.get("/api/websocket/events/recent?limit=2").await;
    resp.assert_status(StatusCode::OK);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["total_events"], 2);
    assert_eq!(body["events"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn recent_events_defaults_to_fifty_and_tolerates_huge_limits() {
    let server = server(test_state());

    let resp = server.get("/api/websocket/events/recent").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["total_events"], 0);

    // A limit past the cap is clamped rather than rejected.
    let resp = server.get("/api/websocket/events/recent?limit=99999").await;
    resp.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn join_while_disconnected_is_service_unavailable() {
    let server = server(test_state());
    let resp = server.post("/api/websocket/matches/42/join").await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn bridge_health_reports_unhealthy_when_disconnected() {
    let server = server(test_state());
    let resp = server.get("/api/websocket/health").await;
    resp.assert_status(StatusCode::OK);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["details"]["connected"], false);
}

#[tokio::test]
async fn cache_stats_report_a_closed_breaker() {
    let server = server(test_state());
    let resp = server.get("/api/cache/stats").await;
    resp.assert_status(StatusCode::OK);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["breaker"]["state"], "closed");
    assert_eq!(body["breaker"]["consecutive_failures"], 0);
}

#[tokio::test]
async fn compare_reports_rest_failure_inside_the_body() {
    let state = test_state();
    state.bridge.event_log().append(event(7, 1));
    state.bridge.event_log().append(event(8, 2));
    state.bridge.event_log().append(event(7, 3));

    let server = server(state);
    let resp = server.get("/api/websocket/validation/compare/7").await;
    resp.assert_status(StatusCode::OK);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["match_id"], 7);
    assert_eq!(body["websocket_event_count"], 2);
    assert_eq!(body["comparison"]["websocket_has_events"], true);
    assert_eq!(body["comparison"]["rest_api_accessible"], false);
    assert!(body["rest_api_data"]["error"].is_string());
    assert_eq!(body["comparison"]["last_websocket_event"]["player_id"], 3);
}
