use std::sync::Arc;

use sleepinn_booking::PendingSweeper;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::metrics::Metrics;

/// Expires lapsed pending holds every `every` until `shutdown` flips. A
/// sweep in progress always runs to completion.
pub async fn start_pending_sweeper(
    sweeper: Arc<PendingSweeper>,
    metrics: Arc<Metrics>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = every.as_secs(), "Pending sweeper started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => match sweeper.sweep_once().await {
                Ok(Some(expired)) => metrics.bookings_expired.inc_by(expired as u64),
                Ok(None) => debug!("Previous sweep still running, skipping tick"),
                Err(e) => error!(error = %e, "Pending sweep failed"),
            },
            _ = shutdown.changed() => {
                info!("Pending sweeper stopping");
                break;
            }
        }
    }
}
