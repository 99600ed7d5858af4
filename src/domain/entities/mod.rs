//! Core domain entities.
//!
//! - [`ShortUrl`] - A durable short code to original URL mapping with its visit total

pub mod short_url;

pub use short_url::ShortUrl;
