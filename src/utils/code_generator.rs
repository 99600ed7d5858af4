//! Short code generation.
//!
//! Codes are drawn uniformly from `[A-Za-z0-9]`. Uniqueness is not guaranteed here;
//! the store's unique constraint and the shortener's retry loop enforce it.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Source of candidate short codes.
///
/// Implementations must be safe to call concurrently.
#[cfg_attr(test, mockall::automock)]
pub trait CodeGenerator: Send + Sync {
    /// Returns a code of exactly `length` characters.
    fn generate(&self, length: usize) -> String;
}

/// Generates codes from the thread-local random source.
///
/// # Examples
///
/// ```ignore
/// let code = RandomCodeGenerator.generate(8);
/// assert_eq!(code.len(), 8);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, length: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}
