//! In-process cache implementation.

use std::time::{Duration, Instant};

use super::keys::visit_key;
use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use moka::future::Cache;
use moka::policy::Expiry;
use tracing::debug;

/// Upper bound on cached mappings; least recently used entries are evicted past it.
pub const MEMORY_CACHE_MAX_CAPACITY: u64 = 100_000;

#[derive(Clone)]
struct Expiring {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Expiring> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Expiring,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Expiring,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// A cache held in process memory.
///
/// Used when Redis is not configured or unreachable at startup. Mappings honor their
/// TTL and are bounded by [`MEMORY_CACHE_MAX_CAPACITY`]; visit counters never expire
/// and live until flushed. Counters are lost on restart, so this backend only suits
/// single-node deployments.
///
/// When built with [`MemoryCache::fallback`] it still serves requests, but its health
/// check fails so the missing Redis is visible on `/health`.
pub struct MemoryCache {
    entries: Cache<String, Expiring>,
    counters: DashMap<String, i64>,
    default_ttl: Duration,
    fallback_reason: Option<String>,
}

impl MemoryCache {
    /// Creates an empty cache with the given default TTL.
    pub fn new(default_ttl_seconds: u64) -> Self {
        debug!("Using MemoryCache (in-process)");
        Self::build(default_ttl_seconds, None)
    }

    /// Creates a cache standing in for a configured backend that could not be reached.
    pub fn fallback(default_ttl_seconds: u64, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug!("Using MemoryCache in place of unreachable Redis: {}", reason);
        Self::build(default_ttl_seconds, Some(reason))
    }

    fn build(default_ttl_seconds: u64, fallback_reason: Option<String>) -> Self {
        let entries = Cache::builder()
            .max_capacity(MEMORY_CACHE_MAX_CAPACITY)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            entries,
            counters: DashMap::new(),
            default_ttl: Duration::from_secs(default_ttl_seconds),
            fallback_reason,
        }
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: Option<u64>) {
        let ttl = ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);

        self.entries
            .insert(
                key.to_string(),
                Expiring {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
    }

    async fn health_check(&self) -> CacheResult<()> {
        match &self.fallback_reason {
            Some(reason) => Err(CacheError::ConnectionError(format!(
                "Redis unreachable, serving from process memory: {}",
                reason
            ))),
            None => Ok(()),
        }
    }

    async fn scan_visit_keys(&self) -> Vec<String> {
        self.counters
            .iter()
            .map(|counter| counter.key().clone())
            .collect()
    }

    async fn get_visit_count(&self, short_code: &str) -> Option<i64> {
        let count = self
            .counters
            .get(&visit_key(short_code))
            .map(|counter| *counter)
            .unwrap_or(0);
        Some(count)
    }

    async fn increment_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
        let total = *self
            .counters
            .entry(visit_key(short_code))
            .and_modify(|count| *count += amount)
            .or_insert(amount);
        Some(total)
    }

    async fn decrement_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
        match self.counters.entry(visit_key(short_code)) {
            Entry::Occupied(mut counter) => {
                *counter.get_mut() -= amount;
                let remaining = *counter.get();
                if remaining <= 0 {
                    counter.remove();
                }
                Some(remaining)
            }
            // Same outcome as DECRBY on a missing key followed by the cleanup.
            Entry::Vacant(_) => Some(-amount),
        }
    }
}
