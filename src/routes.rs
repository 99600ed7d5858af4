//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `POST /s`           - Shorten a URL
//! - `GET  /s/{code}`    - Short link redirect
//! - `GET  /stat/{code}` - Flushed visit total for a code
//! - `GET  /health`      - Health check: database and cache
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Path normalization** - Trailing slash handling

use crate::api::handlers::{health_handler, redirect_handler, shorten_handler, stats_handler};
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Endpoint table without middleware or state.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/s", post(shorten_handler))
        .route("/s/{code}", get(redirect_handler))
        .route("/stat/{code}", get(stats_handler))
        .route("/health", get(health_handler))
}

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    let router = api_routes().with_state(state).layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
