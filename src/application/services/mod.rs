//! Business logic services for the application layer.

pub mod shortener_service;
pub mod stats_service;
pub mod visit_flush_service;

pub use shortener_service::{ShortenerService, ShortenerSettings};
pub use stats_service::StatsService;
pub use visit_flush_service::{FlushOutcome, FlushReport, VisitFlushService};
