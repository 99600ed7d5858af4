//! Visit counter flush: moves cache-side visit deltas into the durable store.
//!
//! # Counter lifecycle
//!
//! 1. **Accruing** - resolves increment `visits:<code>` in the cache
//! 2. **Snapshot** - a flush run reads the counter value
//! 3. **Flushed** - all snapshots are added to the store in one atomic statement
//! 4. **Reconciled** - each counter is decremented by exactly its snapshot; it keeps
//!    any visits that arrived after the snapshot, or is deleted once drained
//!
//! The store is written before the cache is touched. If the store write fails the
//! run aborts with every counter intact and the next run picks them up again. A crash
//! between the store write and the decrements re-flushes those deltas (at-least-once).
//! Dropping the [`VisitFlushService::run_flush`] future does not: once the store write
//! has started, the run finishes on its own task.
//!
//! Runs are serialized within one process. Running flushers in several processes at
//! once can double count; deploy a single flushing instance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::repositories::{ShortUrlRepository, StoreError};
use crate::error::ShortenerError;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::cache::keys::extract_short_code;

/// Summary of a completed flush run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Codes whose deltas were written to the store.
    pub codes: usize,
    /// Sum of all flushed deltas.
    pub visits: i64,
    /// Records the store actually updated (unknown codes are dropped).
    pub matched: u64,
    /// Counters that could not be decremented and will be flushed again.
    pub decrement_failures: usize,
}

/// Result of a single [`VisitFlushService::run_flush`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No positive counters were found.
    NothingToFlush,
    /// Another run in this process was still in progress.
    AlreadyRunning,
    /// Deltas were written to the store and reconciled in the cache.
    Flushed(FlushReport),
}

/// Service draining visit counters from the cache into the store.
pub struct VisitFlushService {
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    running: Arc<Mutex<()>>,
}

impl VisitFlushService {
    /// Creates a new flush service.
    pub fn new(repository: Arc<dyn ShortUrlRepository>, cache: Arc<dyn CacheService>) -> Self {
        Self {
            repository,
            cache,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Performs one flush run.
    ///
    /// Malformed keys and unreadable counters are skipped for this run only.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::StoreUnavailable`] if the bulk increment fails; no
    /// cache counter has been modified in that case.
    pub async fn run_flush(&self) -> Result<FlushOutcome, ShortenerError> {
        let Ok(guard) = self.running.clone().try_lock_owned() else {
            warn!("Visit flush already in progress, skipping this run");
            return Ok(FlushOutcome::AlreadyRunning);
        };

        info!("Starting visit counter flush");

        let keys = self.cache.scan_visit_keys().await;
        if keys.is_empty() {
            info!("No visit keys found in cache; nothing to flush");
            return Ok(FlushOutcome::NothingToFlush);
        }

        let pending = self.snapshot_counters(&keys).await;
        if pending.is_empty() {
            info!("No positive visit counters to flush");
            return Ok(FlushOutcome::NothingToFlush);
        }

        info!("Flushing {} visit counters to the store", pending.len());

        // From the store write on, the run belongs to its own task and holds the lock
        // until every counter is reconciled, even if the caller stops waiting.
        let repository = self.repository.clone();
        let cache = self.cache.clone();
        let commit = tokio::spawn(async move {
            let _guard = guard;
            commit_and_reconcile(repository.as_ref(), cache.as_ref(), pending).await
        });

        match commit.await {
            Ok(result) => result,
            Err(e) => {
                error!("Visit flush task failed: {}", e);
                Err(ShortenerError::StoreUnavailable(StoreError::Unavailable(
                    e.to_string(),
                )))
            }
        }
    }

    /// Reads every valid counter, keeping only strictly positive ones.
    async fn snapshot_counters(&self, keys: &[String]) -> HashMap<String, i64> {
        let mut pending = HashMap::new();

        for key in keys {
            let Some(short_code) = extract_short_code(key) else {
                warn!("Ignoring invalid visit key: {}", key);
                continue;
            };

            match self.cache.get_visit_count(short_code).await {
                Some(count) if count > 0 => {
                    pending.insert(short_code.to_string(), count);
                }
                Some(_) => {}
                None => warn!("Skipping {} due to cache read failure", short_code),
            }
        }

        pending
    }
}

/// Writes all snapshots to the store, then decrements each counter by its snapshot.
async fn commit_and_reconcile(
    repository: &dyn ShortUrlRepository,
    cache: &dyn CacheService,
    pending: HashMap<String, i64>,
) -> Result<FlushOutcome, ShortenerError> {
    let matched = repository
        .bulk_increment_visits(&pending)
        .await
        .map_err(|e| {
            error!("Failed to update store: {}", e);
            error!("Abort flush, cache counters left untouched");
            ShortenerError::StoreUnavailable(e)
        })?;

    let mut decrement_failures = 0;
    for (short_code, count) in &pending {
        if cache
            .decrement_visit_count(short_code, *count)
            .await
            .is_none()
        {
            warn!("Failed to decrement cache counter for {}", short_code);
            decrement_failures += 1;
        }
    }

    let report = FlushReport {
        codes: pending.len(),
        visits: pending.values().sum(),
        matched,
        decrement_failures,
    };
    info!(
        "Flush complete, {} counters applied ({} visits)",
        report.codes, report.visits
    );

    Ok(FlushOutcome::Flushed(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockShortUrlRepository;
    use crate::infrastructure::cache::{CacheResult, MemoryCache, MockCacheService};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// In-memory cache whose scans wait for `release` after signalling `scanning`.
    struct ParkedScanCache {
        inner: MemoryCache,
        scanning: Notify,
        release: Notify,
    }

    /// In-memory cache whose decrements take `delay`.
    struct SlowDecrementCache {
        inner: MemoryCache,
        delay: Duration,
    }

    #[async_trait]
    impl CacheService for ParkedScanCache {
        async fn get(&self, key: &str) -> CacheResult<Option<String>> {
            self.inner.get(key).await
        }
        async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: Option<u64>) {
            self.inner.set_with_ttl(key, value, ttl_seconds).await
        }
        async fn health_check(&self) -> CacheResult<()> {
            self.inner.health_check().await
        }
        async fn scan_visit_keys(&self) -> Vec<String> {
            self.scanning.notify_one();
            self.release.notified().await;
            self.inner.scan_visit_keys().await
        }
        async fn get_visit_count(&self, short_code: &str) -> Option<i64> {
            self.inner.get_visit_count(short_code).await
        }
        async fn increment_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
            self.inner.increment_visit_count(short_code, amount).await
        }
        async fn decrement_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
            self.inner.decrement_visit_count(short_code, amount).await
        }
    }

    #[async_trait]
    impl CacheService for SlowDecrementCache {
        async fn get(&self, key: &str) -> CacheResult<Option<String>> {
            self.inner.get(key).await
        }
        async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: Option<u64>) {
            self.inner.set_with_ttl(key, value, ttl_seconds).await
        }
        async fn health_check(&self) -> CacheResult<()> {
            self.inner.health_check().await
        }
        async fn scan_visit_keys(&self) -> Vec<String> {
            self.inner.scan_visit_keys().await
        }
        async fn get_visit_count(&self, short_code: &str) -> Option<i64> {
            self.inner.get_visit_count(short_code).await
        }
        async fn increment_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
            self.inner.increment_visit_count(short_code, amount).await
        }
        async fn decrement_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
            tokio::time::sleep(self.delay).await;
            self.inner.decrement_visit_count(short_code, amount).await
        }
    }

    fn visit_keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_flush_no_keys() {
        let mut repository = MockShortUrlRepository::new();
        let mut cache = MockCacheService::new();

        cache
            .expect_scan_visit_keys()
            .times(1)
            .returning(Vec::new);
        cache.expect_get_visit_count().times(0);
        repository.expect_bulk_increment_visits().times(0);
        cache.expect_decrement_visit_count().times(0);

        let service = VisitFlushService::new(Arc::new(repository), Arc::new(cache));
        let outcome = service.run_flush().await.unwrap();

        assert_eq!(outcome, FlushOutcome::NothingToFlush);
    }

    #[tokio::test]
    async fn test_flush_single_counter() {
        let mut repository = MockShortUrlRepository::new();
        let mut cache = MockCacheService::new();

        cache
            .expect_scan_visit_keys()
            .returning(|| visit_keys(&["visits:abc123"]));
        cache
            .expect_get_visit_count()
            .withf(|code| code == "abc123")
            .times(1)
            .returning(|_| Some(5));
        repository
            .expect_bulk_increment_visits()
            .withf(|visits| visits.len() == 1 && visits.get("abc123") == Some(&5))
            .times(1)
            .returning(|_| Ok(1));
        cache
            .expect_decrement_visit_count()
            .withf(|code, amount| code == "abc123" && *amount == 5)
            .times(1)
            .returning(|_, _| Some(0));

        let service = VisitFlushService::new(Arc::new(repository), Arc::new(cache));
        let outcome = service.run_flush().await.unwrap();

        assert_eq!(
            outcome,
            FlushOutcome::Flushed(FlushReport {
                codes: 1,
                visits: 5,
                matched: 1,
                decrement_failures: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_flush_skips_zero_and_malformed_keys() {
        let mut repository = MockShortUrlRepository::new();
        let mut cache = MockCacheService::new();

        cache.expect_scan_visit_keys().returning(|| {
            visit_keys(&[
                "visits:abc123",
                "visits:def456",
                "visits:ghi789",
                "visits:",
            ])
        });
        cache
            .expect_get_visit_count()
            .withf(|code| code == "abc123")
            .times(1)
            .returning(|_| Some(5));
        cache
            .expect_get_visit_count()
            .withf(|code| code == "def456")
            .times(1)
            .returning(|_| Some(3));
        cache
            .expect_get_visit_count()
            .withf(|code| code == "ghi789")
            .times(1)
            .returning(|_| Some(0));
        repository
            .expect_bulk_increment_visits()
            .withf(|visits| {
                let expected = HashMap::from([("abc123".to_string(), 5), ("def456".to_string(), 3)]);
                *visits == expected
            })
            .times(1)
            .returning(|_| Ok(2));
        cache
            .expect_decrement_visit_count()
            .withf(|code, amount| code == "abc123" && *amount == 5)
            .times(1)
            .returning(|_, _| Some(0));
        cache
            .expect_decrement_visit_count()
            .withf(|code, amount| code == "def456" && *amount == 3)
            .times(1)
            .returning(|_, _| Some(0));

        let service = VisitFlushService::new(Arc::new(repository), Arc::new(cache));
        let outcome = service.run_flush().await.unwrap();

        assert!(matches!(
            outcome,
            FlushOutcome::Flushed(FlushReport {
                codes: 2,
                visits: 8,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_flush_only_zero_counters_is_noop() {
        let mut repository = MockShortUrlRepository::new();
        let mut cache = MockCacheService::new();

        cache
            .expect_scan_visit_keys()
            .returning(|| visit_keys(&["visits:ghi789"]));
        cache.expect_get_visit_count().returning(|_| Some(0));
        repository.expect_bulk_increment_visits().times(0);
        cache.expect_decrement_visit_count().times(0);

        let service = VisitFlushService::new(Arc::new(repository), Arc::new(cache));
        let outcome = service.run_flush().await.unwrap();

        assert_eq!(outcome, FlushOutcome::NothingToFlush);
    }

    #[tokio::test]
    async fn test_flush_skips_unreadable_counter() {
        let mut repository = MockShortUrlRepository::new();
        let mut cache = MockCacheService::new();

        cache
            .expect_scan_visit_keys()
            .returning(|| visit_keys(&["visits:abc123", "visits:def456"]));
        cache
            .expect_get_visit_count()
            .withf(|code| code == "abc123")
            .returning(|_| None);
        cache
            .expect_get_visit_count()
            .withf(|code| code == "def456")
            .returning(|_| Some(3));
        repository
            .expect_bulk_increment_visits()
            .withf(|visits| visits.len() == 1 && visits.get("def456") == Some(&3))
            .times(1)
            .returning(|_| Ok(1));
        cache
            .expect_decrement_visit_count()
            .withf(|code, amount| code == "def456" && *amount == 3)
            .times(1)
            .returning(|_, _| Some(0));

        let service = VisitFlushService::new(Arc::new(repository), Arc::new(cache));
        service.run_flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_store_failure_leaves_cache_untouched() {
        let mut repository = MockShortUrlRepository::new();
        let mut cache = MockCacheService::new();

        cache
            .expect_scan_visit_keys()
            .returning(|| visit_keys(&["visits:abc123"]));
        cache.expect_get_visit_count().returning(|_| Some(5));
        repository
            .expect_bulk_increment_visits()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection refused".to_string())));
        cache.expect_decrement_visit_count().times(0);

        let service = VisitFlushService::new(Arc::new(repository), Arc::new(cache));
        let result = service.run_flush().await;

        assert!(matches!(
            result.unwrap_err(),
            ShortenerError::StoreUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_flush_reports_decrement_failures() {
        let mut repository = MockShortUrlRepository::new();
        let mut cache = MockCacheService::new();

        cache
            .expect_scan_visit_keys()
            .returning(|| visit_keys(&["visits:abc123"]));
        cache.expect_get_visit_count().returning(|_| Some(2));
        repository
            .expect_bulk_increment_visits()
            .returning(|_| Ok(1));
        cache
            .expect_decrement_visit_count()
            .returning(|_, _| None);

        let service = VisitFlushService::new(Arc::new(repository), Arc::new(cache));
        let outcome = service.run_flush().await.unwrap();

        assert!(matches!(
            outcome,
            FlushOutcome::Flushed(FlushReport {
                decrement_failures: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_run_returns_already_running() {
        let cache = Arc::new(ParkedScanCache {
            inner: MemoryCache::new(3600),
            scanning: Notify::new(),
            release: Notify::new(),
        });
        cache.inner.increment_visit_count("abc123", 4).await;

        let mut repository = MockShortUrlRepository::new();
        repository
            .expect_bulk_increment_visits()
            .times(1)
            .returning(|_| Ok(1));

        let service = Arc::new(VisitFlushService::new(Arc::new(repository), cache.clone()));

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.run_flush().await }
        });
        cache.scanning.notified().await;

        assert_eq!(
            service.run_flush().await.unwrap(),
            FlushOutcome::AlreadyRunning
        );

        cache.release.notify_one();
        let outcome = first.await.unwrap().unwrap();

        assert!(matches!(
            outcome,
            FlushOutcome::Flushed(FlushReport {
                codes: 1,
                visits: 4,
                ..
            })
        ));
        assert_eq!(cache.inner.get_visit_count("abc123").await, Some(0));
    }

    #[tokio::test]
    async fn test_abandoned_run_still_reconciles_counters() {
        let cache = Arc::new(SlowDecrementCache {
            inner: MemoryCache::new(3600),
            delay: Duration::from_millis(200),
        });
        cache.inner.increment_visit_count("abc123", 5).await;

        let mut repository = MockShortUrlRepository::new();
        repository
            .expect_bulk_increment_visits()
            .withf(|visits| visits.len() == 1 && visits.get("abc123") == Some(&5))
            .times(1)
            .returning(|_| Ok(1));

        let service = VisitFlushService::new(Arc::new(repository), cache.clone());

        let abandoned = tokio::time::timeout(Duration::from_millis(50), service.run_flush()).await;
        assert!(abandoned.is_err());

        // The detached run still holds the lock while it decrements.
        assert_eq!(
            service.run_flush().await.unwrap(),
            FlushOutcome::AlreadyRunning
        );

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(cache.inner.scan_visit_keys().await.is_empty());
        assert_eq!(
            service.run_flush().await.unwrap(),
            FlushOutcome::NothingToFlush
        );
    }
}
