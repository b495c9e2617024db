/// Bridge API configuration, loaded from environment variables.
///
/// Every variable has a default matching the docker-compose service names,
/// so a bare container comes up wired to its siblings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Web UI origin for REST lookups (message IDs, RSVP snapshots).
    pub webui_api_url: String,
    /// Web UI WebSocket endpoint the bridge connects to.
    pub websocket_url: String,
    /// Shared key presented in the bridge's auth frame and REST calls.
    pub api_key: String,
    /// Bot-internal HTTP API (embed updates, Discord DMs).
    pub bot_api_url: String,
    /// Redis connection string for the draft cache.
    pub redis_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            webui_api_url: var_or("WEBUI_API_URL", "http://webui:5000"),
            websocket_url: var_or("WEBSOCKET_URL", "ws://webui:5000/ws"),
            api_key: var_or("WEBSOCKET_API_KEY", "discord-bot-internal-key"),
            bot_api_url: var_or("BOT_API_URL", "http://discord-bot:5001"),
            redis_url: var_or("REDIS_URL", "redis://redis:6379/0"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5001),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}
