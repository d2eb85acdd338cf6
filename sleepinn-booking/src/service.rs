use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use sleepinn_catalog::{Quote, QuoteEngine};
use sleepinn_core::{
    Booking, BookingStatus, BookingStore, Clock, CoreError, CoreResult, DateRange, HostBooking,
    HostBookingQuery, HostBookingTab, Payment, PaymentAdapter,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::conflict::ConflictChecker;
use crate::lifecycle::{self, CancelDecision, NOT_CANCELABLE};
use crate::reconciler::{PaymentReconciler, RefundOutcome};

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// How long a pending booking holds its nights.
    pub hold: Duration,
    /// Extra attempts after a serialization failure or deadlock.
    pub transaction_retries: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            hold: Duration::minutes(15),
            transaction_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub listing_id: Uuid,
    pub user_id: String,
    pub range: DateRange,
    pub guests: u32,
}

#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub booking: Booking,
    /// True when an identical fresh hold by the same guest was returned.
    pub reused: bool,
}

enum CancelStep {
    Done(BookingStatus),
    Refund(Booking),
}

pub struct BookingService {
    store: Arc<dyn BookingStore>,
    engine: QuoteEngine,
    clock: Arc<dyn Clock>,
    payments: Option<Arc<dyn PaymentAdapter>>,
    reconciler: Arc<PaymentReconciler>,
    policy: BookingPolicy,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        engine: QuoteEngine,
        clock: Arc<dyn Clock>,
        payments: Option<Arc<dyn PaymentAdapter>>,
        reconciler: Arc<PaymentReconciler>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            store,
            engine,
            clock,
            payments,
            reconciler,
            policy,
        }
    }

    pub async fn quote(&self, listing_id: Uuid, range: &DateRange, guests: u32) -> CoreResult<Quote> {
        let listing = self
            .store
            .find_listing(listing_id)
            .await?
            .ok_or_else(|| listing_not_found(listing_id))?;
        let rows = self.store.availability(listing.id, range).await?;
        self.engine.quote(&listing, &rows, range, guests)
    }

    /// Point-in-time answer; only meaningful inside a booking transaction.
    pub async fn has_conflict(&self, listing_id: Uuid, range: &DateRange) -> CoreResult<bool> {
        let mut tx = self.store.begin().await?;
        ConflictChecker::has_conflict(tx.as_mut(), listing_id, range, self.clock.now(), None).await
    }

    // ========================================================================
    // Create
    // ========================================================================

    pub async fn create_booking(&self, request: &NewBooking) -> CoreResult<CreatedBooking> {
        let created = retry_transient(self.policy.transaction_retries, "create_booking", || {
            self.try_create(request)
        })
        .await?;

        if created.reused {
            info!(booking_id = %created.booking.id, "Reusing fresh pending booking");
        } else {
            info!(
                booking_id = %created.booking.id,
                listing_id = %request.listing_id,
                amount = created.booking.amount,
                "Booking held"
            );
        }
        Ok(created)
    }

    async fn try_create(&self, request: &NewBooking) -> CoreResult<CreatedBooking> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let listing = tx
            .lock_listing(request.listing_id)
            .await?
            .filter(|listing| listing.published)
            .ok_or_else(|| listing_not_found(request.listing_id))?;

        let candidates = tx.overlapping_bookings(listing.id, &request.range).await?;

        // Capacity and availability are checked before any hold is reused.
        let rows = tx.availability(listing.id, &request.range).await?;
        let quote = self.engine.quote(&listing, &rows, &request.range, request.guests)?;

        if let Some(existing) = candidates.iter().find(|b| {
            b.user_id == request.user_id
                && b.range == request.range
                && b.guest_count == request.guests
                && b.status == BookingStatus::Pending
                && b.holds_inventory(now)
        }) {
            return Ok(CreatedBooking {
                booking: existing.clone(),
                reused: true,
            });
        }

        if ConflictChecker::collides(&candidates, &request.range, now, None) {
            return Err(CoreError::Conflict);
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            listing_id: listing.id,
            user_id: request.user_id.clone(),
            range: request.range,
            guest_count: request.guests,
            status: BookingStatus::Pending,
            amount: quote.total_minor(),
            currency: quote.currency.clone(),
            created_at: now,
            expires_at: Some(now + self.policy.hold),
            provider_session_id: None,
        };
        tx.insert_booking(&booking).await?;
        tx.commit().await?;

        Ok(CreatedBooking {
            booking,
            reused: false,
        })
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    pub async fn cancel_booking(&self, booking_id: Uuid, user_id: &str) -> CoreResult<BookingStatus> {
        let step = retry_transient(self.policy.transaction_retries, "cancel_booking", || {
            self.try_cancel(booking_id, user_id)
        })
        .await?;

        match step {
            CancelStep::Done(status) => Ok(status),
            CancelStep::Refund(booking) => self.refund(&booking).await,
        }
    }

    async fn try_cancel(&self, booking_id: Uuid, user_id: &str) -> CoreResult<CancelStep> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| booking_not_found(booking_id))?;
        if booking.user_id != user_id {
            return Err(CoreError::Forbidden);
        }

        match lifecycle::plan_cancel(&booking, now)? {
            CancelDecision::AlreadySettled(status) => Ok(CancelStep::Done(status)),
            CancelDecision::ReleaseHold => {
                if !lifecycle::apply(tx.as_mut(), &booking, BookingStatus::Canceled).await? {
                    return Err(CoreError::IllegalTransition(NOT_CANCELABLE.to_string()));
                }
                tx.commit().await?;
                info!(booking_id = %booking.id, "Pending booking canceled");
                Ok(CancelStep::Done(BookingStatus::Canceled))
            }
            CancelDecision::Refund => Ok(CancelStep::Refund(booking)),
        }
    }

    /// Refund first, then record it. A provider rejection leaves the booking paid.
    async fn refund(&self, booking: &Booking) -> CoreResult<BookingStatus> {
        let refund_ref = match &self.payments {
            None => {
                warn!(booking_id = %booking.id, "No payment provider configured, refunding locally");
                None
            }
            Some(adapter) => {
                let payment_ref = self.payment_ref_for(adapter.as_ref(), booking).await?;
                let receipt = adapter
                    .refund(&payment_ref, &refund_idempotency_key(booking.id))
                    .await
                    .map_err(|e| {
                        error!(booking_id = %booking.id, error = %e, "Provider refund failed");
                        CoreError::from(e)
                    })?;
                Some(receipt.id)
            }
        };

        match self
            .reconciler
            .on_refund_confirmed(booking.id, refund_ref.as_deref())
            .await?
        {
            RefundOutcome::Refunded(_) | RefundOutcome::AlreadyRefunded(_) => Ok(BookingStatus::Refunded),
            RefundOutcome::NotPaid { status, .. } => Ok(status),
            RefundOutcome::UnknownBooking => Err(booking_not_found(booking.id)),
        }
    }

    async fn payment_ref_for(&self, adapter: &dyn PaymentAdapter, booking: &Booking) -> CoreResult<String> {
        if let Some(payment) = self.store.get_payment(booking.id).await? {
            return Ok(payment.provider_ref);
        }
        if let Some(session_id) = &booking.provider_session_id {
            if let Some(payment_ref) = adapter.get_checkout(session_id).await?.payment_ref {
                return Ok(payment_ref);
            }
        }
        Err(CoreError::IllegalTransition("no payment to refund".to_string()))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_booking(&self, booking_id: Uuid, user_id: &str) -> CoreResult<(Booking, Option<Payment>)> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| booking_not_found(booking_id))?;
        if booking.user_id != user_id {
            return Err(CoreError::Forbidden);
        }
        let payment = self.store.get_payment(booking_id).await?;
        Ok((booking, payment))
    }

    pub async fn list_bookings(&self, user_id: &str) -> CoreResult<Vec<(Booking, Option<Payment>)>> {
        Ok(self.store.list_user_bookings(user_id).await?)
    }

    /// Settled bookings on the host's listings. Tabs split on today's UTC date.
    pub async fn list_host_bookings(
        &self,
        host_id: &str,
        tab: HostBookingTab,
        search: Option<&str>,
    ) -> CoreResult<Vec<HostBooking>> {
        let query = HostBookingQuery::new(tab, self.clock.now().date_naive(), search);
        Ok(self.store.list_host_bookings(host_id, &query).await?)
    }
}

/// Stable per booking so a retried cancel never refunds twice.
pub fn refund_idempotency_key(booking_id: Uuid) -> String {
    format!("refund-{booking_id}")
}

pub(crate) fn listing_not_found(id: Uuid) -> CoreError {
    CoreError::NotFound(format!("listing {id}"))
}

pub(crate) fn booking_not_found(id: Uuid) -> CoreError {
    CoreError::NotFound(format!("booking {id}"))
}

/// Re-run a whole transaction while the store reports transient failures.
pub(crate) async fn retry_transient<T, F, Fut>(
    retries: u32,
    operation: &'static str,
    mut attempt: F,
) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut failures = 0;
    loop {
        match attempt().await {
            Err(err) if err.is_transient() && failures < retries => {
                failures += 1;
                warn!(operation, attempt = failures, error = %err, "Transient store failure, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(10 * u64::from(failures))).await;
            }
            other => return other,
        }
    }
}
