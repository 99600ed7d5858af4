//! PostgreSQL implementation of the short URL repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};

use crate::domain::entities::ShortUrl;
use crate::domain::repositories::{ShortUrlRepository, StoreError};

/// Unique constraint backing code collision detection.
const SHORT_CODE_CONSTRAINT: &str = "short_urls_short_code_key";
/// Unique index over `md5(original_url)` guaranteeing one code per URL.
const ORIGINAL_URL_CONSTRAINT: &str = "short_urls_original_url_md5_key";

/// PostgreSQL repository for short URL mappings.
///
/// Every method borrows a connection from the pool for the duration of the call;
/// sqlx returns it on every exit path, including errors and early returns.
pub struct PgShortUrlRepository {
    pool: Arc<PgPool>,
}

impl PgShortUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Classifies an sqlx error into the store's error taxonomy.
pub fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            match db.constraint() {
                Some(SHORT_CODE_CONSTRAINT) => return StoreError::CodeCollision,
                Some(ORIGINAL_URL_CONSTRAINT) => return StoreError::DuplicateUrl,
                _ => {}
            }
        }
    }

    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl ShortUrlRepository for PgShortUrlRepository {
    async fn url_exists(&self, original_url: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM short_urls
                WHERE md5(original_url) = md5($1) AND original_url = $1
            )
            "#,
        )
        .bind(original_url)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)
    }

    async fn insert(&self, short_code: &str, original_url: &str) -> Result<String, StoreError> {
        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO short_urls (short_code, original_url)
            VALUES ($1, $2)
            RETURNING short_code
            "#,
        )
        .bind(short_code)
        .bind(original_url)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)?;

        info!("Inserted short URL: {} -> {}", inserted, original_url);
        Ok(inserted)
    }

    async fn find_original_url(&self, short_code: &str) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT original_url FROM short_urls WHERE short_code = $1")
            .bind(short_code)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(map_sqlx_error)
    }

    async fn bulk_increment_visits(
        &self,
        visits: &HashMap<String, i64>,
    ) -> Result<u64, StoreError> {
        if visits.is_empty() {
            return Ok(0);
        }

        let (codes, deltas): (Vec<String>, Vec<i64>) = visits
            .iter()
            .map(|(short_code, delta)| (short_code.clone(), *delta))
            .unzip();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE short_urls AS s
            SET visits = s.visits + v.delta
            FROM UNNEST($1::text[], $2::bigint[]) AS v(short_code, delta)
            WHERE s.short_code = v.short_code
            "#,
        )
        .bind(codes)
        .bind(deltas)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to bulk increment visits: {}", e);
            map_sqlx_error(e)
        })?
        .rows_affected();

        // Dropping an uncommitted transaction rolls it back.
        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            "Bulk incremented visits for {} short codes ({} matched)",
            visits.len(),
            updated
        );
        Ok(updated)
    }

    async fn get_stat(&self, short_code: &str) -> Result<Option<ShortUrl>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, i64, DateTime<Utc>)>(
            r#"
            SELECT short_code, original_url, visits, created_at
            FROM short_urls
            WHERE short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(short_code, original_url, visits, created_at)| {
            ShortUrl::new(short_code, original_url, visits, created_at)
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
