//! Cache service trait and error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),
    #[error("Cache operation error: {0}")]
    OperationError(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Best-effort key-value accelerator for lookups and unflushed visit counters.
///
/// The cache is never authoritative. Every operation must tolerate the backend being
/// unreachable: lookups surface the failure so the caller can fall back to the store,
/// writes log and swallow it, and counter operations report it as `None` so callers
/// can tell "no visits" (`Some(0)`) from "cache down".
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache with TTL support
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process cache for single-node setups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Reads a value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` on hit
    /// - `Ok(None)` on miss
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails; callers treat it as a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores a value with a TTL in seconds, or the configured default when `None`.
    ///
    /// Failures are logged, never raised.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: Option<u64>);

    /// Checks that the backend is reachable.
    ///
    /// Used by the health endpoint only.
    async fn health_check(&self) -> CacheResult<()>;

    /// Lists every key in the visit-counter namespace.
    ///
    /// Pages through the whole keyspace. Returns an empty list if the scan fails.
    async fn scan_visit_keys(&self) -> Vec<String>;

    /// Reads the unflushed visit delta for a code.
    ///
    /// Returns `Some(0)` when no counter exists and `None` only on cache failure.
    async fn get_visit_count(&self, short_code: &str) -> Option<i64>;

    /// Adds `amount` to the counter and returns the new value, `None` on failure.
    async fn increment_visit_count(&self, short_code: &str, amount: i64) -> Option<i64>;

    /// Subtracts `amount` from the counter and returns the new value, `None` on failure.
    ///
    /// A counter that drops to zero or below is deleted.
    async fn decrement_visit_count(&self, short_code: &str, amount: i64) -> Option<i64>;
}
