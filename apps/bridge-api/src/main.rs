use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bridge_api::bridge::client::RsvpBridge;
use bridge_api::bridge::embed::{EmbedUpdateAdapter, HttpEmbedUpdater, HttpRsvpMessageLookup};
use bridge_api::cache::{CacheStore, CircuitBreaker, DraftCache, MemoryStore, RedisStore};
use bridge_api::config::Config;
use bridge_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let http = reqwest::Client::new();

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

    tracing::info!(
        websocket_url = %config.websocket_url,
        webui_api_url = %config.webui_api_url,
        "bridge-api configured"
    );

    // Connects, reconnects with backoff, and rejoins rooms for the life of
    // the process.
    bridge.spawn_supervisor();

    // The cache must never block startup: an unreachable Redis degrades to
    // an in-memory store and the breaker handles later trouble.
    let store: Box<dyn CacheStore> = match RedisStore::connect(&config.redis_url).await {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::error!(error = %e, "redis unreachable, using in-memory draft cache");
            Box::new(MemoryStore::new())
        }
    };
    let cache = Arc::new(DraftCache::new(store, Arc::new(CircuitBreaker::default())));

    let state = AppState {
        bridge,
        cache,
        config: Arc::new(config),
        http,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(bridge_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "bridge-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
