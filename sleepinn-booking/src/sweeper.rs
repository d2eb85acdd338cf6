use std::sync::Arc;

use sleepinn_core::{BookingStore, Clock, CoreResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Expires pending bookings whose hold lapsed. One pass at a time.
pub struct PendingSweeper {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<()>,
}

impl PendingSweeper {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one pass. Returns `None` if another pass is still running.
    pub async fn sweep_once(&self) -> CoreResult<Option<usize>> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Pending sweep already in progress, skipping");
            return Ok(None);
        };

        let expired = self.store.expire_pending(self.clock.now()).await?;
        if expired.is_empty() {
            debug!("Pending sweep found nothing to expire");
        } else {
            info!(expired = expired.len(), "Pending sweep finished");
        }
        Ok(Some(expired.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use chrono::Duration;
    use sleepinn_core::BookingStatus;

    #[tokio::test]
    async fn test_sweep_expires_only_lapsed_pending() {
        let h = Harness::new().await;
        let early = h.create("guest-a", "2025-06-01", "2025-06-03").await.unwrap();
        h.clock.advance(Duration::minutes(10));
        let late = h.create("guest-b", "2025-07-01", "2025-07-03").await.unwrap();
        let paid = h.paid_booking("guest-c", "2025-08-01", "2025-08-03").await;

        h.clock.advance(Duration::minutes(6));
        assert_eq!(h.sweeper.sweep_once().await.unwrap(), Some(1));

        assert_eq!(h.status(early.booking.id).await, BookingStatus::Expired);
        assert_eq!(h.status(late.booking.id).await, BookingStatus::Pending);
        assert_eq!(h.status(paid.id).await, BookingStatus::Paid);

        // Second pass has nothing left to do.
        assert_eq!(h.sweeper.sweep_once().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_sweep_at_exact_expiry_instant() {
        let h = Harness::new().await;
        let created = h.create("guest-a", "2025-06-01", "2025-06-03").await.unwrap();
        h.clock.set(created.booking.expires_at.unwrap());

        assert_eq!(h.sweeper.sweep_once().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_idle_sweep_expires_nothing() {
        let h = Harness::new().await;
        let created = h.create("guest-a", "2025-06-01", "2025-06-03").await.unwrap();

        assert_eq!(h.sweeper.sweep_once().await.unwrap(), Some(0));
        assert_eq!(h.status(created.booking.id).await, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_do_not_overlap() {
        let h = Harness::new().await;
        let _guard = h.sweeper.in_flight.lock().await;

        assert_eq!(h.sweeper.sweep_once().await.unwrap(), None);
    }
}
