//! In-memory store for tests and local development.
//!
//! A transaction takes the single state lock for its whole lifetime and
//! works on a staged copy, so transactions are fully serialized and a
//! dropped transaction leaves no trace. Not durable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sleepinn_core::{
    AvailabilityDay, Booking, BookingStatus, BookingStore, DateRange, HostBooking, HostBookingQuery,
    Listing, Payment, StoreError, StoreResult, StoreTx,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    listings: HashMap<Uuid, Listing>,
    availability: BTreeMap<(Uuid, NaiveDate), AvailabilityDay>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

impl MemoryState {
    fn availability(&self, listing_id: Uuid, range: &DateRange) -> Vec<AvailabilityDay> {
        self.availability
            .range((listing_id, range.start())..(listing_id, range.end()))
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn overlapping(&self, listing_id: Uuid, range: &DateRange) -> Vec<Booking> {
        self.bookings
            .values()
            .filter(|b| {
                b.listing_id == listing_id
                    && matches!(b.status, BookingStatus::Paid | BookingStatus::Pending)
                    && b.range.overlaps(range)
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failing_commits: Arc<AtomicU32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_listing(&self, listing: Listing) {
        self.state.lock().await.listings.insert(listing.id, listing);
    }

    pub async fn put_availability(&self, row: AvailabilityDay) {
        self.state
            .lock()
            .await
            .availability
            .insert((row.listing_id, row.day), row);
    }

    /// Insert a booking as-is, bypassing every check.
    pub async fn seed_booking(&self, booking: Booking) {
        self.state.lock().await.bookings.insert(booking.id, booking);
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.values().cloned().collect()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.values().cloned().collect()
    }

    /// Make the next `n` commits fail as serialization failures.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            staged,
            failing_commits: self.failing_commits.clone(),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_listing(&self, id: Uuid) -> StoreResult<Option<Listing>> {
        let state = self.state.lock().await;
        Ok(state.listings.get(&id).filter(|l| l.published).cloned())
    }

    async fn availability(&self, listing_id: Uuid, range: &DateRange) -> StoreResult<Vec<AvailabilityDay>> {
        Ok(self.state.lock().await.availability(listing_id, range))
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn list_user_bookings(&self, user_id: &str) -> StoreResult<Vec<(Booking, Option<Payment>)>> {
        let state = self.state.lock().await;
        let mut mine: Vec<_> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .map(|b| (b.clone(), state.payments.get(&b.id).cloned()))
            .collect();
        mine.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn list_host_bookings(&self, host_id: &str, query: &HostBookingQuery) -> StoreResult<Vec<HostBooking>> {
        let state = self.state.lock().await;
        let mut found: Vec<HostBooking> = state
            .bookings
            .values()
            .filter_map(|b| {
                let listing = state.listings.get(&b.listing_id)?;
                (listing.host_id == host_id && query.matches(b, &listing.title)).then(|| HostBooking {
                    booking: b.clone(),
                    payment: state.payments.get(&b.id).cloned(),
                    listing_title: listing.title.clone(),
                })
            })
            .collect();
        found.sort_by(|a, b| {
            b.booking
                .range
                .start()
                .cmp(&a.booking.range.start())
                .then_with(|| b.booking.id.cmp(&a.booking.id))
        });
        Ok(found)
    }

    async fn get_payment(&self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.state.lock().await.payments.get(&booking_id).cloned())
    }

    async fn find_booking_by_session(&self, session_id: &str) -> StoreResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.provider_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn find_booking_by_payment_ref(&self, payment_ref: &str) -> StoreResult<Option<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.provider_ref == payment_ref)
            .map(|p| p.booking_id))
    }

    async fn set_provider_session(&self, booking_id: Uuid, session_id: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(booking) = state.bookings.get_mut(&booking_id) {
            booking.provider_session_id = Some(session_id.to_string());
        }
        Ok(())
    }

    async fn expire_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        let mut expired = Vec::new();
        for booking in state.bookings.values_mut() {
            if booking.status == BookingStatus::Pending && booking.expires_at.is_some_and(|at| at <= now) {
                booking.status = BookingStatus::Expired;
                expired.push(booking.id);
            }
        }
        Ok(expired)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    failing_commits: Arc<AtomicU32>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_listing(&mut self, id: Uuid) -> StoreResult<Option<Listing>> {
        Ok(self.staged.listings.get(&id).cloned())
    }

    async fn availability(&mut self, listing_id: Uuid, range: &DateRange) -> StoreResult<Vec<AvailabilityDay>> {
        Ok(self.staged.availability(listing_id, range))
    }

    async fn overlapping_bookings(&mut self, listing_id: Uuid, range: &DateRange) -> StoreResult<Vec<Booking>> {
        Ok(self.staged.overlapping(listing_id, range))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        if self.staged.bookings.contains_key(&booking.id) {
            return Err(StoreError::Database(format!("duplicate booking id {}", booking.id)));
        }
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn lock_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.staged.bookings.get(&id).cloned())
    }

    async fn update_status(&mut self, id: Uuid, from: BookingStatus, to: BookingStatus) -> StoreResult<bool> {
        match self.staged.bookings.get_mut(&id) {
            Some(booking) if booking.status == from => {
                booking.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_payment(&mut self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.staged.payments.get(&booking_id).cloned())
    }

    async fn upsert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        self.staged.payments.insert(payment.booking_id, payment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx {
            mut guard,
            staged,
            failing_commits,
        } = *self;

        let injected = failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Transient("injected serialization failure".to_string()));
        }

        *guard = staged;
        Ok(())
    }
}
