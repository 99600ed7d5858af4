//! Shortening and resolution service.
//!
//! Implements the cache-aside protocol between the cache and the durable store:
//! reads try the cache first and repopulate it from the store on a miss, writes go
//! to the store first and then populate the cache. The cache is a hint; any cache
//! failure degrades to the store path instead of failing the call.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::repositories::{ShortUrlRepository, StoreError};
use crate::error::ShortenerError;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::cache::keys::{short_key, url_key};
use crate::utils::code_generator::CodeGenerator;

/// Code generation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortenerSettings {
    /// Length of generated codes.
    pub code_length: usize,
    /// Insert attempts before giving up with [`ShortenerError::CodeGenerationFailed`].
    pub max_retries: u32,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self {
            code_length: 8,
            max_retries: 10,
        }
    }
}

impl From<&Config> for ShortenerSettings {
    fn from(config: &Config) -> Self {
        Self {
            code_length: config.short_code_length,
            max_retries: config.short_code_max_retries,
        }
    }
}

/// Service for creating short codes and resolving them back to URLs.
///
/// Holds no cross-request locks. Concurrent shorteners racing for the same code are
/// serialized by the store's unique constraint: the candidate is inserted directly
/// and a collision is detected from the failed insert, never by a prior lookup.
pub struct ShortenerService {
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    generator: Arc<dyn CodeGenerator>,
    settings: ShortenerSettings,
}

impl ShortenerService {
    /// Creates a new shortener service.
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        cache: Arc<dyn CacheService>,
        generator: Arc<dyn CodeGenerator>,
        settings: ShortenerSettings,
    ) -> Self {
        Self {
            repository,
            cache,
            generator,
            settings,
        }
    }

    /// Shortens `original_url` and returns the new code.
    ///
    /// # Flow
    ///
    /// 1. Cache check on the `url -> short` entry (best effort)
    /// 2. Store existence check
    /// 3. Generate-and-insert loop, retrying on code collisions only
    /// 4. Populate both cache directions (best effort)
    ///
    /// # Errors
    ///
    /// - [`ShortenerError::AlreadyExists`] if the URL is already mapped
    /// - [`ShortenerError::CodeGenerationFailed`] once every attempt collided
    /// - [`ShortenerError::StoreUnavailable`] on any other store failure, without retry
    pub async fn shorten(&self, original_url: &str) -> Result<String, ShortenerError> {
        match self.cache.get(&url_key(original_url)).await {
            Ok(Some(cached_code)) => {
                info!(
                    "Cache hit for original URL: {} -> {}",
                    original_url, cached_code
                );
                return Err(already_exists(original_url));
            }
            Ok(None) => {}
            Err(e) => debug!("Cache unavailable during shorten, falling back to store: {}", e),
        }

        let exists = self
            .repository
            .url_exists(original_url)
            .await
            .map_err(|e| {
                error!("Store unavailable when checking URL existence: {}", e);
                ShortenerError::StoreUnavailable(e)
            })?;

        if exists {
            info!("Original URL already exists: {}", original_url);
            return Err(already_exists(original_url));
        }

        let short_code = self.insert_with_new_code(original_url).await?;
        self.cache_mapping(&short_code, original_url).await;

        Ok(short_code)
    }

    /// Resolves a short code to its original URL and records a visit.
    ///
    /// A cache hit never touches the store. On a miss (or cache failure) the store is
    /// consulted and both cache directions are repopulated.
    ///
    /// # Errors
    ///
    /// - [`ShortenerError::NotFound`] if the code does not exist
    /// - [`ShortenerError::StoreUnavailable`] if the store cannot be queried
    pub async fn resolve(&self, short_code: &str) -> Result<String, ShortenerError> {
        match self.cache.get(&short_key(short_code)).await {
            Ok(Some(original_url)) => {
                debug!("Cache hit for short code: {}", short_code);
                self.record_visit(short_code).await;
                return Ok(original_url);
            }
            Ok(None) => debug!("Cache miss for short code: {}", short_code),
            Err(e) => debug!("Cache unavailable during resolve, falling back to store: {}", e),
        }

        let original_url = self
            .repository
            .find_original_url(short_code)
            .await
            .map_err(|e| {
                error!("Store unavailable: {}", e);
                ShortenerError::StoreUnavailable(e)
            })?
            .ok_or_else(|| {
                info!("Short code not found: {}", short_code);
                ShortenerError::NotFound {
                    short_code: short_code.to_string(),
                }
            })?;

        self.cache_mapping(short_code, &original_url).await;
        self.record_visit(short_code).await;

        Ok(original_url)
    }

    /// Generates candidates until one inserts cleanly.
    async fn insert_with_new_code(&self, original_url: &str) -> Result<String, ShortenerError> {
        let max_retries = self.settings.max_retries;

        for attempt in 1..=max_retries {
            let candidate = self.generator.generate(self.settings.code_length);

            match self.repository.insert(&candidate, original_url).await {
                Ok(short_code) => {
                    info!(
                        "Inserted mapping: {} -> {} (attempt {})",
                        short_code, original_url, attempt
                    );
                    return Ok(short_code);
                }
                Err(StoreError::CodeCollision) => {
                    warn!(
                        "Collision for short code {} (attempt {}/{})",
                        candidate, attempt, max_retries
                    );
                }
                Err(StoreError::DuplicateUrl) => {
                    info!("Original URL inserted concurrently: {}", original_url);
                    return Err(already_exists(original_url));
                }
                Err(e) => {
                    error!("Store error while inserting short URL: {}", e);
                    return Err(ShortenerError::StoreUnavailable(e));
                }
            }
        }

        error!(
            "Failed to generate unique short code after {} attempts",
            max_retries
        );
        Err(ShortenerError::CodeGenerationFailed {
            attempts: max_retries,
        })
    }

    /// Writes both cache directions with the default TTL.
    async fn cache_mapping(&self, short_code: &str, original_url: &str) {
        self.cache
            .set_with_ttl(&short_key(short_code), original_url, None)
            .await;
        self.cache
            .set_with_ttl(&url_key(original_url), short_code, None)
            .await;
    }

    /// Bumps the unflushed visit counter; a failure only loses this one visit.
    async fn record_visit(&self, short_code: &str) {
        if self
            .cache
            .increment_visit_count(short_code, 1)
            .await
            .is_none()
        {
            warn!("Failed to record visit for {}", short_code);
        }
    }
}

fn already_exists(original_url: &str) -> ShortenerError {
    ShortenerError::AlreadyExists {
        original_url: original_url.to_string(),
    }
}
