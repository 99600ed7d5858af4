//! Domain layer containing business entities and repository contracts.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//!
//! The domain layer has no dependencies on infrastructure or presentation layers.
//! Orchestration (cache-aside lookups, collision retries, visit flushing) lives in
//! [`crate::application::services`].

pub mod entities;
pub mod repositories;
