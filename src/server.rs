//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache setup, the flush worker, and the Axum server
//! lifecycle including graceful shutdown.

use crate::application::flush_worker::run_flush_worker;
use crate::application::services::{
    FlushOutcome, ShortenerService, ShortenerSettings, StatsService, VisitFlushService,
};
use crate::config::Config;
use crate::domain::repositories::ShortUrlRepository;
use crate::infrastructure::cache::{CacheService, MemoryCache, RedisCache};
use crate::infrastructure::persistence::PgShortUrlRepository;
use crate::routes::app_router;
use crate::state::AppState;
use crate::utils::code_generator::{CodeGenerator, RandomCodeGenerator};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

/// Connection attempts made before startup gives up on the database.
const DB_CONNECT_ATTEMPTS: usize = 5;

/// Opens the PostgreSQL pool, retrying with exponential backoff.
///
/// # Errors
///
/// Returns the last connection error once every attempt failed.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let options = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime));

    // 500ms, 1s, 2s, 4s (jittered)
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(250)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(DB_CONNECT_ATTEMPTS - 1);

    let pool = Retry::spawn(strategy, || {
        let options = options.clone();
        async move {
            options.connect(&config.database_url).await.inspect_err(|e| {
                tracing::warn!("Database connection attempt failed: {}", e);
            })
        }
    })
    .await
    .context("Failed to connect to database")?;

    tracing::info!("Connected to database");
    Ok(pool)
}

/// Builds the cache backend.
///
/// Uses Redis when configured and reachable, otherwise the in-process
/// [`MemoryCache`]. A cache failure never prevents startup, but a configured Redis
/// that could not be reached leaves the cache reporting unhealthy on `/health`.
pub async fn build_cache(config: &Config) -> Arc<dyn CacheService> {
    let ttl = config.cache_ttl_seconds();

    match &config.redis_url {
        Some(redis_url) => match RedisCache::connect(redis_url, ttl).await {
            Ok(redis) => {
                tracing::info!("Cache enabled (Redis)");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using MemoryCache.", e);
                Arc::new(MemoryCache::fallback(ttl, e.to_string()))
            }
        },
        None => {
            tracing::info!("Redis not configured, using MemoryCache");
            Arc::new(MemoryCache::new(ttl))
        }
    }
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Redis cache (or MemoryCache fallback)
/// - Periodic visit flush worker
/// - Axum HTTP server
///
/// On Ctrl-C or SIGTERM the server stops accepting connections, the flush worker
/// stops between runs, a final flush drains pending visits and the pool is closed.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations applied");

    let cache = build_cache(&config).await;

    let repository: Arc<dyn ShortUrlRepository> =
        Arc::new(PgShortUrlRepository::new(Arc::new(pool.clone())));
    let generator: Arc<dyn CodeGenerator> = Arc::new(RandomCodeGenerator);

    let shortener_service = Arc::new(ShortenerService::new(
        repository.clone(),
        cache.clone(),
        generator,
        ShortenerSettings::from(&config),
    ));
    let stats_service = Arc::new(StatsService::new(repository.clone()));
    let flush_service = Arc::new(VisitFlushService::new(repository.clone(), cache.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = match config.flush_interval() {
        Some(period) => Some(tokio::spawn(run_flush_worker(
            flush_service.clone(),
            period,
            shutdown_rx,
        ))),
        None => {
            tracing::info!("Visit flush worker disabled; run `admin flush` externally");
            None
        }
    };

    let state = AppState {
        shortener_service,
        stats_service,
        repository,
        cache,
        base_url: config.base_url.clone(),
    };

    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, draining visit counters");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            tracing::error!("Visit flush worker panicked: {}", e);
        }
    }

    final_flush(&flush_service).await;

    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Runs one last flush so visits counted since the previous run reach the database.
///
/// Carries no deadline of its own; the pool's acquire timeout and the cache client
/// bound it. A run that has committed to the store always reaches its decrements.
async fn final_flush(flush_service: &VisitFlushService) {
    match flush_service.run_flush().await {
        Ok(FlushOutcome::Flushed(report)) => {
            tracing::info!("Final flush applied {} visits", report.visits);
        }
        Ok(_) => {}
        Err(e) => tracing::error!("Final flush failed: {}", e),
    }
}

/// Resolves when Ctrl-C or (on Unix) SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
