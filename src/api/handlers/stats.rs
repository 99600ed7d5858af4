//! Handler for per-code statistics.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::dto::stats::StatResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Returns the flushed visit total for a short code.
///
/// # Endpoint
///
/// `GET /stat/{code}`
///
/// # Response
///
/// ```json
/// {
///   "short_code": "aZ3kP9qX",
///   "original_url": "https://example.com",
///   "visits": 42,
///   "created": "2025-01-01T12:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StatResponse>, AppError> {
    let record = state.stats_service.get_stat(&code).await?;

    Ok(Json(record.into()))
}
