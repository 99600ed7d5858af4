//! Handler for the shortening endpoint.

use axum::{Json, extract::State};
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link for a long URL.
///
/// # Endpoint
///
/// `POST /s`
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com/some/long/path" }
/// ```
///
/// # Response
///
/// ```json
/// { "short_url": "http://localhost:8080/s/aZ3kP9qX" }
/// ```
///
/// # Errors
///
/// - **400** malformed or non-http(s) URL
/// - **409** URL already shortened
/// - **500** code generation exhausted its retries
/// - **503** database unavailable
pub async fn shorten_handler(
    State(state): State<AppState>,
    Json(payload): Json<ShortenRequest>,
) -> Result<Json<ShortenResponse>, AppError> {
    payload.validate()?;
    payload.ensure_http_scheme()?;

    let short_code = state.shortener_service.shorten(&payload.url).await?;

    Ok(Json(ShortenResponse {
        short_url: state.short_url(&short_code),
    }))
}
