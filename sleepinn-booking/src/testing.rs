use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use sleepinn_catalog::QuoteEngine;
use sleepinn_core::{
    AvailabilityDay, Booking, BookingStatus, BookingStore, Clock, CoreResult, DateRange, Listing,
    ManualClock, PaymentAdapter,
};
use sleepinn_store::MemoryStore;
use uuid::Uuid;

use crate::{
    BookingPolicy, BookingService, CheckoutService, CreatedBooking, MockPaymentAdapter, NewBooking,
    PaymentConfirmation, PaymentReconciler, PendingSweeper,
};

pub(crate) const HOST: &str = "host-1";

pub(crate) fn range(start: &str, end: &str) -> DateRange {
    DateRange::parse(start, end).unwrap()
}

/// Services wired over the in-memory store, a manual clock starting on
/// 2025-05-01 and a listing at 100.00/night for up to 4 guests.
pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub payments: Arc<MockPaymentAdapter>,
    pub reconciler: Arc<PaymentReconciler>,
    pub bookings: BookingService,
    pub checkout: CheckoutService,
    pub sweeper: PendingSweeper,
    pub listing: Listing,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(true).await
    }

    pub async fn without_provider() -> Self {
        Self::build(false).await
    }

    async fn build(with_provider: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
        ));
        let payments = Arc::new(MockPaymentAdapter::new());

        let store_dyn: Arc<dyn BookingStore> = store.clone();
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let adapter: Option<Arc<dyn PaymentAdapter>> = if with_provider {
            Some(payments.clone())
        } else {
            None
        };

        let reconciler = Arc::new(PaymentReconciler::new(store_dyn.clone(), clock_dyn.clone(), 3));
        let bookings = BookingService::new(
            store_dyn.clone(),
            QuoteEngine::new(dec!(0.08)),
            clock_dyn.clone(),
            adapter.clone(),
            reconciler.clone(),
            BookingPolicy::default(),
        );
        let checkout = CheckoutService::new(
            store_dyn.clone(),
            clock_dyn.clone(),
            adapter,
            reconciler.clone(),
            "https://sleepinn.test/",
        );
        let sweeper = PendingSweeper::new(store_dyn, clock_dyn);

        let listing = new_listing(true);
        store.insert_listing(listing.clone()).await;

        Self {
            store,
            clock,
            payments,
            reconciler,
            bookings,
            checkout,
            sweeper,
            listing,
        }
    }

    pub async fn seed_listing(&self, published: bool) -> Listing {
        let listing = new_listing(published);
        self.store.insert_listing(listing.clone()).await;
        listing
    }

    pub async fn block_day(&self, day: &str) {
        self.store
            .put_availability(AvailabilityDay {
                listing_id: self.listing.id,
                day: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
                is_available: false,
                capacity: self.listing.base_capacity,
                price_override: None,
            })
            .await;
    }

    pub async fn create(&self, user: &str, start: &str, end: &str) -> CoreResult<CreatedBooking> {
        self.bookings
            .create_booking(&NewBooking {
                listing_id: self.listing.id,
                user_id: user.to_string(),
                range: range(start, end),
                guests: 2,
            })
            .await
    }

    pub async fn confirm(&self, booking_id: Uuid, payment_ref: &str) {
        let booking = self.store.get_booking(booking_id).await.unwrap().unwrap();
        self.reconciler
            .on_payment_confirmed(&PaymentConfirmation {
                booking_id: Some(booking_id),
                session_id: None,
                payment_ref: payment_ref.to_string(),
                amount: booking.amount,
                currency: booking.currency,
            })
            .await
            .unwrap();
    }

    pub async fn paid_booking(&self, user: &str, start: &str, end: &str) -> Booking {
        let created = self.create(user, start, end).await.unwrap();
        let id = created.booking.id;
        self.confirm(id, &format!("pi_{}", id.simple())).await;
        let booking = self.store.get_booking(id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Paid);
        booking
    }

    pub async fn status(&self, booking_id: Uuid) -> BookingStatus {
        self.store.get_booking(booking_id).await.unwrap().unwrap().status
    }
}

fn new_listing(published: bool) -> Listing {
    Listing {
        id: Uuid::new_v4(),
        host_id: HOST.to_string(),
        title: "Riverside studio".to_string(),
        base_price: dec!(100.00),
        base_capacity: 4,
        currency: "myr".to_string(),
        published,
    }
}
