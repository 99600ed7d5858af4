//! Application layer services implementing business logic.
//!
//! This layer orchestrates the cache and the store. Services consume the repository
//! and cache traits and provide a clean API for HTTP handlers and the admin CLI.
//!
//! # Available Services
//!
//! - [`services::shortener_service::ShortenerService`] - Shortening and cache-aside resolution
//! - [`services::stats_service::StatsService`] - Per-code visit statistics
//! - [`services::visit_flush_service::VisitFlushService`] - Cache-to-store visit flush
//!
//! [`flush_worker::run_flush_worker`] drives the flush on a fixed interval.

pub mod flush_worker;
pub mod services;
