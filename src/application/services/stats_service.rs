//! Visit statistics service.

use std::sync::Arc;

use tracing::error;

use crate::domain::entities::ShortUrl;
use crate::domain::repositories::ShortUrlRepository;
use crate::error::ShortenerError;

/// Read-only access to per-code statistics.
///
/// Totals come from the store only, so they trail the live count by whatever is still
/// waiting in the cache for the next flush.
pub struct StatsService {
    repository: Arc<dyn ShortUrlRepository>,
}

impl StatsService {
    /// Creates a new statistics service.
    pub fn new(repository: Arc<dyn ShortUrlRepository>) -> Self {
        Self { repository }
    }

    /// Retrieves the record and flushed visit total for a short code.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::NotFound`] if no record matches the code.
    /// Returns [`ShortenerError::StoreUnavailable`] on store failure.
    pub async fn get_stat(&self, short_code: &str) -> Result<ShortUrl, ShortenerError> {
        self.repository
            .get_stat(short_code)
            .await
            .map_err(|e| {
                error!("Store unavailable while reading stats: {}", e);
                ShortenerError::StoreUnavailable(e)
            })?
            .ok_or_else(|| ShortenerError::NotFound {
                short_code: short_code.to_string(),
            })
    }
}
