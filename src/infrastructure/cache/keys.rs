//! Cache key namespaces.
//!
//! | Prefix     | Value          | TTL        |
//! |------------|----------------|------------|
//! | `short:`   | original URL   | configured |
//! | `url:`     | short code     | configured |
//! | `visits:`  | unflushed hits | none       |

pub const SHORT_PREFIX: &str = "short:";
pub const URL_PREFIX: &str = "url:";
pub const VISITS_PREFIX: &str = "visits:";

/// Key of the `short -> url` entry.
pub fn short_key(short_code: &str) -> String {
    format!("{SHORT_PREFIX}{short_code}")
}

/// Key of the inverse `url -> short` entry.
pub fn url_key(original_url: &str) -> String {
    format!("{URL_PREFIX}{original_url}")
}

/// Key of the visit counter for a code.
pub fn visit_key(short_code: &str) -> String {
    format!("{VISITS_PREFIX}{short_code}")
}

/// Extracts the short code from a visit-counter key.
///
/// Returns `None` for keys outside the namespace or with an empty code.
pub fn extract_short_code(key: &str) -> Option<&str> {
    key.strip_prefix(VISITS_PREFIX)
        .filter(|short_code| !short_code.is_empty())
}
