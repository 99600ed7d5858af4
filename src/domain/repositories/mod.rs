//! Repository trait definitions for the domain layer.
//!
//! Traits define the contract for data operations; implementations live in
//! `crate::infrastructure::persistence`. Mock implementations are generated via
//! `mockall` for unit tests.
//!
//! # Available Repositories
//!
//! - [`ShortUrlRepository`] - Short URL mappings and visit totals
//!
//! # Testing
//!
//! See `tests/repository_short_url.rs` for the PostgreSQL implementation and
//! `tests/common` for the in-memory double used by the service tests.

pub mod short_url_repository;

pub use short_url_repository::{ShortUrlRepository, StoreError};

#[cfg(test)]
pub use short_url_repository::MockShortUrlRepository;
