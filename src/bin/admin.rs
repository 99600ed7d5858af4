//! CLI administration tool for snaplink.
//!
//! Runs maintenance operations directly against the database and cache without
//! going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Flush pending visit counters once (e.g. from cron with FLUSH_INTERVAL_SECONDS=0)
//! cargo run --bin admin -- flush
//!
//! # Show the flushed visit total for a code
//! cargo run --bin admin -- stat aZ3kP9qX
//!
//! # Check connectivity
//! cargo run --bin admin -- db check
//! cargo run --bin admin -- cache check
//! ```
//!
//! # Environment Variables
//!
//! Uses the same variables as the server; see [`snaplink::config`].

use snaplink::application::services::{FlushOutcome, StatsService, VisitFlushService};
use snaplink::config::{self, Config};
use snaplink::infrastructure::cache::RedisCache;
use snaplink::infrastructure::persistence::PgShortUrlRepository;
use snaplink::server::connect_database;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;

/// CLI tool for managing snaplink.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Move pending visit counters from the cache into the database
    Flush,

    /// Show statistics for a short code
    Stat {
        /// Short code to look up
        code: String,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Cache operations
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,
}

/// Cache operation subcommands.
#[derive(Subcommand)]
enum CacheAction {
    /// Check Redis connection
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Flush => handle_flush(&config).await?,
        Commands::Stat { code } => handle_stat(&config, &code).await?,
        Commands::Db { action } => handle_db_action(action, &config).await?,
        Commands::Cache { action } => handle_cache_action(action, &config).await?,
    }

    Ok(())
}

/// Runs a single flush against the shared Redis counters.
///
/// Fails when Redis is not configured or unreachable: visits counted in a server's
/// process memory are only reachable by that server's own flush worker.
async fn handle_flush(config: &Config) -> Result<()> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        anyhow::bail!(
            "Redis is not configured (set REDIS_URL or REDIS_HOST); \
             in-process counters are flushed by the server itself"
        );
    };

    let cache = RedisCache::connect(redis_url, config.cache_ttl_seconds())
        .await
        .context("Redis connection failed, visit counters are unreachable")?;

    let pool = connect_database(config).await?;
    let repository = Arc::new(PgShortUrlRepository::new(Arc::new(pool.clone())));
    let service = VisitFlushService::new(repository, Arc::new(cache));

    println!("{}", "🔄 Flushing visit counters...".bright_blue());

    match service.run_flush().await? {
        FlushOutcome::NothingToFlush => {
            println!("{}", "Nothing to flush".dimmed());
        }
        FlushOutcome::AlreadyRunning => {
            println!("{}", "A flush is already running".yellow());
        }
        FlushOutcome::Flushed(report) => {
            println!("{}", "✅ Flush complete".green().bold());
            println!();
            println!(
                "  Codes:   {}",
                report.codes.to_string().bright_green().bold()
            );
            println!(
                "  Visits:  {}",
                report.visits.to_string().bright_green().bold()
            );
            println!("  Matched: {}", report.matched.to_string().bright_white());
            if report.decrement_failures > 0 {
                println!(
                    "  {}",
                    format!(
                        "{} counters could not be decremented and will be flushed again",
                        report.decrement_failures
                    )
                    .red()
                );
            }
            println!();
        }
    }

    pool.close().await;
    Ok(())
}

/// Prints the stored record for a code.
async fn handle_stat(config: &Config, code: &str) -> Result<()> {
    let pool = connect_database(config).await?;
    let service = StatsService::new(Arc::new(PgShortUrlRepository::new(Arc::new(pool.clone()))));

    let record = service.get_stat(code).await?;

    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();
    println!("  Code:    {}", record.short_code.bright_white().bold());
    println!("  URL:     {}", record.original_url);
    println!("  Created: {}", record.created_at.to_rfc3339());
    println!(
        "  Visits:  {}",
        record.visits.to_string().bright_green().bold()
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, config: &Config) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            let pool = connect_database(config).await?;
            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(&pool)
                .await?;

            println!("{}", "✅ Database connection OK".green().bold());
            println!("  PostgreSQL: {}", version.bright_white());
            pool.close().await;
        }
    }

    Ok(())
}

/// Handles cache diagnostic commands.
async fn handle_cache_action(action: CacheAction, config: &Config) -> Result<()> {
    match action {
        CacheAction::Check => {
            let Some(redis_url) = config.redis_url.as_deref() else {
                anyhow::bail!("Redis is not configured (set REDIS_URL or REDIS_HOST)");
            };

            println!("{}", "🔍 Checking Redis connection...".bright_blue());

            RedisCache::connect(redis_url, config.cache_ttl_seconds())
                .await
                .context("Redis connection failed")?;

            println!("{}", "✅ Redis connection OK".green().bold());
        }
    }

    Ok(())
}
