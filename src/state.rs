//! Shared application state passed to HTTP handlers.

use std::sync::Arc;

use crate::application::services::{ShortenerService, StatsService};
use crate::domain::repositories::ShortUrlRepository;
use crate::infrastructure::cache::CacheService;

/// Handler state, cheap to clone.
///
/// `repository` and `cache` are exposed directly for health checks only; every
/// shortening and lookup path goes through the services.
#[derive(Clone)]
pub struct AppState {
    pub shortener_service: Arc<ShortenerService>,
    pub stats_service: Arc<StatsService>,
    pub repository: Arc<dyn ShortUrlRepository>,
    pub cache: Arc<dyn CacheService>,
    pub base_url: String,
}

impl AppState {
    /// Composes the user-facing link for a short code (`{base_url}/s/{code}`).
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/s/{}", self.base_url.trim_end_matches('/'), short_code)
    }
}
