//! Periodic driver for the visit flush.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::application::services::{FlushOutcome, VisitFlushService};

/// Runs [`VisitFlushService::run_flush`] every `period` until shutdown is signalled.
///
/// The first run starts immediately so counters left by a previous process are
/// picked up. Shutdown is only observed between runs; a run in progress always
/// completes its store write and cache reconciliation.
pub async fn run_flush_worker(
    service: Arc<VisitFlushService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Visit flush worker started (every {}s)", period.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.run_flush().await {
                    Ok(FlushOutcome::Flushed(report)) => {
                        debug!("Flush run applied {} visits", report.visits);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Visit flush failed, will retry next run: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Visit flush worker stopped");
}
