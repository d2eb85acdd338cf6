use std::sync::Arc;

use chrono::{DateTime, Utc};
use sleepinn_core::{
    Booking, BookingStatus, BookingStore, Clock, CoreResult, Payment, PaymentStatus, StoreTx,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::conflict::ConflictChecker;
use crate::lifecycle;
use crate::service::retry_transient;

/// A provider's statement that money was captured for a checkout.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub booking_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub payment_ref: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Paid(Uuid),
    AlreadyPaid(Uuid),
    /// Money arrived for a booking that can no longer be paid. Recorded for
    /// manual follow-up, booking status untouched.
    Unpayable { booking_id: Uuid, status: BookingStatus },
    /// Replay for a booking that was already refunded.
    Ignored { booking_id: Uuid, status: BookingStatus },
    UnknownBooking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded(Uuid),
    AlreadyRefunded(Uuid),
    NotPaid { booking_id: Uuid, status: BookingStatus },
    UnknownBooking,
}

/// Converges bookings with provider-side payment events. The only writer of
/// payment rows; every handler is idempotent so duplicate or reordered
/// deliveries are harmless.
pub struct PaymentReconciler {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    retries: u32,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>, retries: u32) -> Self {
        Self { store, clock, retries }
    }

    pub async fn on_payment_confirmed(&self, event: &PaymentConfirmation) -> CoreResult<ConfirmOutcome> {
        let Some(booking_id) = self.resolve(event).await? else {
            error!(
                anomaly = "payment_for_unknown_booking",
                session_id = ?event.session_id,
                payment_ref = %event.payment_ref,
                "Payment confirmation matches no booking"
            );
            return Ok(ConfirmOutcome::UnknownBooking);
        };

        let outcome = retry_transient(self.retries, "payment_confirmed", || {
            self.try_confirm(booking_id, event)
        })
        .await?;

        match &outcome {
            ConfirmOutcome::Paid(id) => info!(booking_id = %id, "Booking paid"),
            ConfirmOutcome::AlreadyPaid(id) => info!(booking_id = %id, "Duplicate payment confirmation"),
            ConfirmOutcome::Ignored { booking_id, status } => {
                info!(booking_id = %booking_id, status = %status, "Payment confirmation for settled booking ignored")
            }
            ConfirmOutcome::Unpayable { booking_id, status } => error!(
                anomaly = "payment_for_unpayable_booking",
                booking_id = %booking_id,
                status = %status,
                payment_ref = %event.payment_ref,
                amount = event.amount,
                "Payment captured for a booking that cannot be paid"
            ),
            ConfirmOutcome::UnknownBooking => error!(
                anomaly = "payment_for_unknown_booking",
                booking_id = %booking_id,
                "Booking vanished during payment confirmation"
            ),
        }
        Ok(outcome)
    }

    /// Explicit booking id wins; the stored checkout session is the fallback.
    async fn resolve(&self, event: &PaymentConfirmation) -> CoreResult<Option<Uuid>> {
        if let Some(id) = event.booking_id {
            if self.store.get_booking(id).await?.is_some() {
                return Ok(Some(id));
            }
        }
        if let Some(session_id) = &event.session_id {
            return Ok(self
                .store
                .find_booking_by_session(session_id)
                .await?
                .map(|booking| booking.id));
        }
        Ok(None)
    }

    async fn try_confirm(&self, booking_id: Uuid, event: &PaymentConfirmation) -> CoreResult<ConfirmOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let Some(booking) = tx.lock_booking(booking_id).await? else {
            return Ok(ConfirmOutcome::UnknownBooking);
        };

        if event.amount != booking.amount {
            warn!(
                booking_id = %booking.id,
                expected = booking.amount,
                received = event.amount,
                "Captured amount differs from quoted total"
            );
        }

        let outcome = match booking.status {
            BookingStatus::Paid => {
                record_payment(tx.as_mut(), &booking, event, now).await?;
                ConfirmOutcome::AlreadyPaid(booking.id)
            }
            BookingStatus::Refunded => {
                return Ok(ConfirmOutcome::Ignored {
                    booking_id: booking.id,
                    status: booking.status,
                });
            }
            BookingStatus::Pending => {
                // A lapsed hold is only honoured if nobody took the nights meanwhile.
                let taken = !booking.holds_inventory(now) && {
                    tx.lock_listing(booking.listing_id).await?;
                    ConflictChecker::has_conflict(
                        tx.as_mut(),
                        booking.listing_id,
                        &booking.range,
                        now,
                        Some(booking.id),
                    )
                    .await?
                };
                if taken {
                    record_payment(tx.as_mut(), &booking, event, now).await?;
                    ConfirmOutcome::Unpayable {
                        booking_id: booking.id,
                        status: booking.status,
                    }
                } else if lifecycle::apply(tx.as_mut(), &booking, BookingStatus::Paid).await? {
                    record_payment(tx.as_mut(), &booking, event, now).await?;
                    ConfirmOutcome::Paid(booking.id)
                } else {
                    return Err(sleepinn_core::CoreError::TransientStore(
                        "booking changed during payment confirmation".to_string(),
                    ));
                }
            }
            BookingStatus::Canceled | BookingStatus::Expired => {
                record_payment(tx.as_mut(), &booking, event, now).await?;
                ConfirmOutcome::Unpayable {
                    booking_id: booking.id,
                    status: booking.status,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn on_refund_confirmed(&self, booking_id: Uuid, refund_ref: Option<&str>) -> CoreResult<RefundOutcome> {
        let outcome = retry_transient(self.retries, "refund_confirmed", || {
            self.try_refund(booking_id, refund_ref)
        })
        .await?;

        match &outcome {
            RefundOutcome::Refunded(id) => info!(booking_id = %id, refund_ref = ?refund_ref, "Booking refunded"),
            RefundOutcome::AlreadyRefunded(id) => info!(booking_id = %id, "Duplicate refund confirmation"),
            RefundOutcome::NotPaid { booking_id, status } => warn!(
                booking_id = %booking_id,
                status = %status,
                "Refund confirmation for a booking that is not paid"
            ),
            RefundOutcome::UnknownBooking => error!(
                anomaly = "refund_for_unknown_booking",
                booking_id = %booking_id,
                "Refund confirmation matches no booking"
            ),
        }
        Ok(outcome)
    }

    /// Refund notice that only carries the provider's payment reference.
    pub async fn on_refund_for_payment(&self, payment_ref: &str, refund_ref: Option<&str>) -> CoreResult<RefundOutcome> {
        match self.store.find_booking_by_payment_ref(payment_ref).await? {
            Some(booking_id) => self.on_refund_confirmed(booking_id, refund_ref).await,
            None => {
                warn!(payment_ref, "Refund for a payment we never recorded");
                Ok(RefundOutcome::UnknownBooking)
            }
        }
    }

    async fn try_refund(&self, booking_id: Uuid, refund_ref: Option<&str>) -> CoreResult<RefundOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let Some(booking) = tx.lock_booking(booking_id).await? else {
            return Ok(RefundOutcome::UnknownBooking);
        };

        let outcome = match booking.status {
            BookingStatus::Paid => {
                if !lifecycle::apply(tx.as_mut(), &booking, BookingStatus::Refunded).await? {
                    return Err(sleepinn_core::CoreError::TransientStore(
                        "booking changed during refund".to_string(),
                    ));
                }
                RefundOutcome::Refunded(booking.id)
            }
            BookingStatus::Refunded => RefundOutcome::AlreadyRefunded(booking.id),
            status => {
                return Ok(RefundOutcome::NotPaid {
                    booking_id: booking.id,
                    status,
                })
            }
        };

        if let Some(mut payment) = tx.get_payment(booking.id).await? {
            if payment.status != PaymentStatus::Refunded || payment.refund_ref.is_none() {
                payment.status = PaymentStatus::Refunded;
                payment.refund_ref = refund_ref.map(str::to_string).or(payment.refund_ref);
                payment.updated_at = now;
                tx.upsert_payment(&payment).await?;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

/// Upsert the succeeded payment row. A refunded row is never downgraded.
async fn record_payment(
    tx: &mut dyn StoreTx,
    booking: &Booking,
    event: &PaymentConfirmation,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if let Some(existing) = tx.get_payment(booking.id).await? {
        if existing.status == PaymentStatus::Refunded || existing.provider_ref == event.payment_ref {
            return Ok(());
        }
    }
    tx.upsert_payment(&Payment {
        booking_id: booking.id,
        provider_ref: event.payment_ref.clone(),
        amount: event.amount,
        currency: event.currency.to_lowercase(),
        status: PaymentStatus::Succeeded,
        refund_ref: None,
        updated_at: now,
    })
    .await?;
    Ok(())
}
