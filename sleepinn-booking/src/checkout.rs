use std::sync::Arc;

use sleepinn_core::{
    Booking, BookingStatus, BookingStore, CheckoutRequest, Clock, CoreError, CoreResult,
    PaymentAdapter,
};
use tracing::info;
use uuid::Uuid;

use crate::reconciler::{PaymentConfirmation, PaymentReconciler};
use crate::service::booking_not_found;

/// Hands a guest's pending booking to the provider's hosted checkout and
/// polls the provider when a webhook is late.
pub struct CheckoutService {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    payments: Option<Arc<dyn PaymentAdapter>>,
    reconciler: Arc<PaymentReconciler>,
    public_url: String,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        payments: Option<Arc<dyn PaymentAdapter>>,
        reconciler: Arc<PaymentReconciler>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            payments,
            reconciler,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn owned_booking(&self, booking_id: Uuid, user_id: &str) -> CoreResult<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| booking_not_found(booking_id))?;
        if booking.user_id != user_id {
            return Err(CoreError::Forbidden);
        }
        Ok(booking)
    }

    /// Returns the provider URL the guest should be redirected to.
    pub async fn start_checkout(&self, booking_id: Uuid, user_id: &str) -> CoreResult<String> {
        let booking = self.owned_booking(booking_id, user_id).await?;
        match booking.status {
            BookingStatus::Paid => {
                return Err(CoreError::IllegalTransition("already paid".to_string()))
            }
            BookingStatus::Pending if booking.holds_inventory(self.clock.now()) => {}
            _ => return Err(CoreError::IllegalTransition("not payable".to_string())),
        }
        let adapter = self.payments.as_ref().ok_or(CoreError::PaymentsDisabled)?;

        let request = CheckoutRequest {
            booking_id: booking.id,
            amount: booking.amount,
            currency: booking.currency.clone(),
            description: format!("Stay {} to {}", booking.range.start(), booking.range.end()),
            success_url: format!("{}/checkout/success?booking={}", self.public_url, booking.id),
            cancel_url: format!("{}/trips?booking={}", self.public_url, booking.id),
        };
        let session = adapter.create_checkout(&request).await?;
        self.store.set_provider_session(booking.id, &session.id).await?;
        info!(booking_id = %booking.id, session_id = %session.id, "Checkout session opened");

        session
            .url
            .ok_or_else(|| CoreError::UpstreamPayment("checkout session has no redirect url".to_string()))
    }

    /// Ask the provider directly whether the guest paid, and reconcile if so.
    pub async fn sync_payment(&self, booking_id: Uuid, user_id: &str) -> CoreResult<BookingStatus> {
        let booking = self.owned_booking(booking_id, user_id).await?;
        if booking.status != BookingStatus::Pending {
            return Ok(booking.status);
        }
        let (Some(adapter), Some(session_id)) = (&self.payments, &booking.provider_session_id) else {
            return Ok(booking.status);
        };

        let session = adapter.get_checkout(session_id).await?;
        if !session.paid {
            return Ok(booking.status);
        }

        let confirmation = PaymentConfirmation {
            booking_id: Some(booking.id),
            payment_ref: session.payment_ref.clone().unwrap_or_else(|| session.id.clone()),
            session_id: Some(session.id),
            amount: session.amount_total.unwrap_or(booking.amount),
            currency: session.currency.unwrap_or_else(|| booking.currency.clone()),
        };
        self.reconciler.on_payment_confirmed(&confirmation).await?;

        let refreshed = self
            .store
            .get_booking(booking.id)
            .await?
            .ok_or_else(|| booking_not_found(booking.id))?;
        Ok(refreshed.status)
    }
}
