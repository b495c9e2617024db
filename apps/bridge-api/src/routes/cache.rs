//! Diagnostics for the draft cache and its circuit breaker.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let breaker = state.cache.breaker();
    Json(serde_json::json!({
        "status": "success",
        "breaker": {
            "state": breaker.state(),
            "consecutive_failures": breaker.consecutive_failures(),
        },
    }))
}
