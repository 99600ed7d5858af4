//! Redis-backed cache implementation.

use super::keys::{VISITS_PREFIX, visit_key};
use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::{debug, error, info, warn};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH_SIZE: usize = 500;

/// Decrements a counter and deletes it once it is fully drained.
///
/// Runs atomically on the server, so no increment can land between the decrement
/// and the delete.
const DECREMENT_AND_CLEAN_SCRIPT: &str = r#"
local value = redis.call('DECRBY', KEYS[1], ARGV[1])
if value <= 0 then
    redis.call('DEL', KEYS[1])
end
return value
"#;

/// Redis cache for URL mappings and unflushed visit counters.
///
/// Uses `ConnectionManager` for connection reuse and automatic reconnects. Timeouts
/// are those of the client itself; no extra timeout wrapping is applied.
pub struct RedisCache {
    client: ConnectionManager,
    default_ttl: u64,
    /// Loaded once per server and then called by SHA (`EVALSHA`).
    decrement_script: Script,
}

impl RedisCache {
    /// Connects to Redis, validates the connection with a PING, and configures the default TTL.
    ///
    /// # Arguments
    ///
    /// - `redis_url` - Redis connection string, the path selects the logical database
    ///   (e.g., `"redis://localhost:6379/0"`)
    /// - `default_ttl_seconds` - TTL applied by [`CacheService::set_with_ttl`] when called
    ///   with `None`; derived from `CACHE_TTL_HOURS`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(redis_url: &str, default_ttl_seconds: u64) -> CacheResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            default_ttl: default_ttl_seconds,
            decrement_script: Script::new(DECREMENT_AND_CLEAN_SCRIPT),
        })
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.client.clone();

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(value)) => {
                debug!("Cache HIT: {}", key);
                Ok(Some(value))
            }
            Ok(None) => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
            Err(e) => Err(CacheError::OperationError(format!(
                "GET {} failed: {}",
                key, e
            ))),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: Option<u64>) {
        let mut conn = self.client.clone();
        let ttl_seconds = ttl_seconds.unwrap_or(self.default_ttl);

        match conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await {
            Ok(_) => debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds),
            Err(e) => warn!("Redis SET error for {}: {}", key, e),
        }
    }

    async fn health_check(&self) -> CacheResult<()> {
        let mut conn = self.client.clone();
        conn.ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))
    }

    async fn scan_visit_keys(&self) -> Vec<String> {
        let mut conn = self.client.clone();
        let pattern = format!("{VISITS_PREFIX}*");
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let page = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async::<(u64, Vec<String>)>(&mut conn)
                .await;

            match page {
                Ok((next_cursor, batch)) => {
                    keys.extend(batch);
                    if next_cursor == 0 {
                        break;
                    }
                    cursor = next_cursor;
                }
                Err(e) => {
                    error!("Redis SCAN error for {}: {}", pattern, e);
                    return Vec::new();
                }
            }
        }

        // SCAN may return a key more than once while the keyspace is rehashing.
        keys.sort_unstable();
        keys.dedup();
        debug!("Found {} visit keys", keys.len());
        keys
    }

    async fn get_visit_count(&self, short_code: &str) -> Option<i64> {
        let mut conn = self.client.clone();

        match conn.get::<_, Option<i64>>(visit_key(short_code)).await {
            Ok(count) => Some(count.unwrap_or(0)),
            Err(e) => {
                warn!("Redis GET error for visit counter {}: {}", short_code, e);
                None
            }
        }
    }

    async fn increment_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
        let mut conn = self.client.clone();

        match conn.incr::<_, _, i64>(visit_key(short_code), amount).await {
            Ok(total) => Some(total),
            Err(e) => {
                warn!("Redis INCRBY error for {}: {}", short_code, e);
                None
            }
        }
    }

    async fn decrement_visit_count(&self, short_code: &str, amount: i64) -> Option<i64> {
        let mut conn = self.client.clone();

        let result = self
            .decrement_script
            .key(visit_key(short_code))
            .arg(amount)
            .invoke_async::<i64>(&mut conn)
            .await;

        match result {
            Ok(remaining) => {
                if remaining <= 0 {
                    debug!("Visit counter drained and removed: {}", short_code);
                }
                Some(remaining)
            }
            Err(e) => {
                warn!("Redis DECRBY error for {}: {}", short_code, e);
                None
            }
        }
    }
}
