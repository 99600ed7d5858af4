//! Short URL entity: a durable code-to-URL mapping with its visit total.

use chrono::{DateTime, Utc};

/// A persisted short URL mapping.
///
/// `short_code` and `original_url` never change once inserted. `visits` holds the
/// cumulative total as of the last successful visit flush; unflushed visits live in
/// the cache as deltas until the next flush run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortUrl {
    pub short_code: String,
    pub original_url: String,
    pub visits: i64,
    pub created_at: DateTime<Utc>,
}

impl ShortUrl {
    /// Creates a new ShortUrl instance.
    pub fn new(
        short_code: String,
        original_url: String,
        visits: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            short_code,
            original_url,
            visits,
            created_at,
        }
    }
}
