pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;

use std::sync::Arc;

use bridge::client::RsvpBridge;
use cache::{CacheStore, DraftCache};
use config::Config;

/// Draft cache over whichever backend the host process selected.
pub type SharedDraftCache = DraftCache<Box<dyn CacheStore>>;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<RsvpBridge>,
    pub cache: Arc<SharedDraftCache>,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}
