//! DTOs for the shortening endpoint.

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use validator::Validate;

use crate::error::AppError;

/// Request to shorten a single URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// The original URL to shorten (must be valid HTTP/HTTPS).
    #[validate(url(message = "Invalid URL format"))]
    pub url: String,
}

impl ShortenRequest {
    /// Rejects URLs whose scheme is not `http` or `https`.
    ///
    /// The `url` validator accepts any scheme, so `ftp://` or `mailto:` would
    /// otherwise pass.
    pub fn ensure_http_scheme(&self) -> Result<(), AppError> {
        match Url::parse(&self.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
            _ => Err(AppError::bad_request(
                "Only http and https URLs can be shortened.",
                json!({ "url": self.url }),
            )),
        }
    }
}

/// Response carrying the composed short link.
#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub short_url: String,
}
