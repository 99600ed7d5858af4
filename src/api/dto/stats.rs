//! DTOs for per-code statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::ShortUrl;

/// Flushed visit total and metadata for one short code.
///
/// `visits` excludes visits still pending in the cache.
#[derive(Debug, Serialize)]
pub struct StatResponse {
    pub short_code: String,
    pub original_url: String,
    pub visits: i64,
    pub created: DateTime<Utc>,
}

impl From<ShortUrl> for StatResponse {
    fn from(record: ShortUrl) -> Self {
        Self {
            short_code: record.short_code,
            original_url: record.original_url,
            visits: record.visits,
            created: record.created_at,
        }
    }
}
