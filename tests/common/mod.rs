#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use snaplink::application::services::{
    ShortenerService, ShortenerSettings, StatsService, VisitFlushService,
};
use snaplink::domain::entities::ShortUrl;
use snaplink::domain::repositories::{ShortUrlRepository, StoreError};
use snaplink::infrastructure::cache::{CacheError, CacheResult, CacheService};
use snaplink::state::AppState;
use snaplink::utils::code_generator::{CodeGenerator, RandomCodeGenerator};

/// In-memory store enforcing both unique constraints, with failure injection.
#[derive(Default)]
pub struct FakeStore {
    records: Mutex<HashMap<String, ShortUrl>>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `find_original_url` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn seed(&self, short_code: &str, original_url: &str, visits: i64) {
        self.records.lock().unwrap().insert(
            short_code.to_string(),
            ShortUrl::new(
                short_code.to_string(),
                original_url.to_string(),
                visits,
                Utc::now(),
            ),
        );
    }

    pub fn visits(&self, short_code: &str) -> Option<i64> {
        self.records
            .lock()
            .unwrap()
            .get(short_code)
            .map(|r| r.visits)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ShortUrlRepository for FakeStore {
    async fn url_exists(&self, original_url: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .any(|r| r.original_url == original_url))
    }

    async fn insert(&self, short_code: &str, original_url: &str) -> Result<String, StoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        if records.contains_key(short_code) {
            return Err(StoreError::CodeCollision);
        }
        if records.values().any(|r| r.original_url == original_url) {
            return Err(StoreError::DuplicateUrl);
        }
        records.insert(
            short_code.to_string(),
            ShortUrl::new(
                short_code.to_string(),
                original_url.to_string(),
                0,
                Utc::now(),
            ),
        );
        Ok(short_code.to_string())
    }

    async fn find_original_url(&self, short_code: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(short_code)
            .map(|r| r.original_url.clone()))
    }

    async fn bulk_increment_visits(
        &self,
        visits: &HashMap<String, i64>,
    ) -> Result<u64, StoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let mut matched = 0;
        for (short_code, delta) in visits {
            if let Some(record) = records.get_mut(short_code) {
                record.visits += delta;
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn get_stat(&self, short_code: &str) -> Result<Option<ShortUrl>, StoreError> {
        self.check()?;
        Ok(self.records.lock().unwrap().get(short_code).cloned())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check()
    }
}

/// Cache whose every operation fails.
pub struct FailingCache;

#[async_trait]
impl CacheService for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::ConnectionError("connection refused".to_string()))
    }

    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl_seconds: Option<u64>) {}

    async fn health_check(&self) -> CacheResult<()> {
        Err(CacheError::ConnectionError("connection refused".to_string()))
    }

    async fn scan_visit_keys(&self) -> Vec<String> {
        Vec::new()
    }

    async fn get_visit_count(&self, _short_code: &str) -> Option<i64> {
        None
    }

    async fn increment_visit_count(&self, _short_code: &str, _amount: i64) -> Option<i64> {
        None
    }

    async fn decrement_visit_count(&self, _short_code: &str, _amount: i64) -> Option<i64> {
        None
    }
}

/// Hands out queued codes first, then random ones.
#[derive(Default)]
pub struct ScriptedGenerator {
    codes: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
        }
    }
}

impl CodeGenerator for ScriptedGenerator {
    fn generate(&self, length: usize) -> String {
        self.codes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RandomCodeGenerator.generate(length))
    }
}

pub const BASE_URL: &str = "http://localhost:8080";

pub fn shortener(
    store: Arc<FakeStore>,
    cache: Arc<dyn CacheService>,
    generator: Arc<dyn CodeGenerator>,
    settings: ShortenerSettings,
) -> ShortenerService {
    ShortenerService::new(store, cache, generator, settings)
}

pub fn flusher(store: Arc<FakeStore>, cache: Arc<dyn CacheService>) -> VisitFlushService {
    VisitFlushService::new(store, cache)
}

pub fn create_test_state(store: Arc<FakeStore>, cache: Arc<dyn CacheService>) -> AppState {
    let repository: Arc<dyn ShortUrlRepository> = store;

    let shortener_service = Arc::new(ShortenerService::new(
        repository.clone(),
        cache.clone(),
        Arc::new(RandomCodeGenerator),
        ShortenerSettings::default(),
    ));
    let stats_service = Arc::new(StatsService::new(repository.clone()));

    AppState {
        shortener_service,
        stats_service,
        repository,
        cache,
        base_url: BASE_URL.to_string(),
    }
}
