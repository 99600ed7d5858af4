//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx.
//!
//! # Repositories
//!
//! - [`PgShortUrlRepository`] - Short URL storage, lookup and visit accounting

pub mod pg_short_url_repository;

pub use pg_short_url_repository::PgShortUrlRepository;
