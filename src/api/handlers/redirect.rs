//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::Redirect,
};

use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /s/{code}`
///
/// Resolution goes through the cache first and falls back to the database; every
/// successful resolve counts one visit. See
/// [`ShortenerService::resolve`](crate::application::services::ShortenerService::resolve).
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
/// Returns 503 Service Unavailable if the database cannot be reached on a cache miss.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let original_url = state.shortener_service.resolve(&code).await?;

    Ok(Redirect::temporary(&original_url))
}
