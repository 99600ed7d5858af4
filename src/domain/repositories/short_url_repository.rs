//! Repository trait for the durable short URL store.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::ShortUrl;

/// Failures reported by a [`ShortUrlRepository`].
///
/// Unique-constraint violations are business signals, not faults: the store's
/// constraint on `short_code` is the authoritative collision detector.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The candidate short code is already taken.
    #[error("short code already exists")]
    CodeCollision,

    /// The original URL was inserted concurrently under another code.
    #[error("original URL already exists")]
    DuplicateUrl,

    /// The store could not be reached or the statement failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Repository interface for short URL mappings and their visit totals.
///
/// Every call acquires a pooled connection for its own duration only; nothing is
/// held across calls.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgShortUrlRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    /// Returns whether `original_url` is already mapped to a short code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the pool or connection cannot be used.
    async fn url_exists(&self, original_url: &str) -> Result<bool, StoreError>;

    /// Inserts a new mapping and returns the inserted code.
    ///
    /// No existence pre-check is made for the code; the unique constraint decides.
    ///
    /// # Errors
    ///
    /// - [`StoreError::CodeCollision`] if `short_code` is taken
    /// - [`StoreError::DuplicateUrl`] if `original_url` is already mapped
    /// - [`StoreError::Unavailable`] on any other failure (the insert is rolled back)
    async fn insert(&self, short_code: &str, original_url: &str) -> Result<String, StoreError>;

    /// Point lookup of the original URL for a code. A miss is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    async fn find_original_url(&self, short_code: &str) -> Result<Option<String>, StoreError>;

    /// Adds each delta to the matching record's `visits` in one atomic statement.
    ///
    /// An empty map is a no-op that touches no connection. Deltas for unknown codes
    /// are silently dropped. Returns the number of records updated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`]; the store is left unchanged.
    async fn bulk_increment_visits(&self, visits: &HashMap<String, i64>)
    -> Result<u64, StoreError>;

    /// Fetches the full record for a code, including its flushed visit total.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    async fn get_stat(&self, short_code: &str) -> Result<Option<ShortUrl>, StoreError>;

    /// Trivial round-trip query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store is unreachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}
