pub mod cache;
pub mod health;
pub mod websocket;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/websocket", websocket::router())
        .nest("/api/cache", cache::router())
}
