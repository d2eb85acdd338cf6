use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    AvailabilityDay, Booking, BookingStatus, DateRange, HostBooking, HostBookingQuery, Listing,
    Payment,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Serialization failure, deadlock or lock timeout. Safe to retry the
    /// whole transaction.
    #[error("transient: {0}")]
    Transient(String),
    #[error("database: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access and transaction factory for listings, bookings and payments.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    async fn ping(&self) -> StoreResult<()>;

    /// Published listings only.
    async fn find_listing(&self, id: Uuid) -> StoreResult<Option<Listing>>;

    async fn availability(
        &self,
        listing_id: Uuid,
        range: &DateRange,
    ) -> StoreResult<Vec<AvailabilityDay>>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    /// Newest first.
    async fn list_user_bookings(
        &self,
        user_id: &str,
    ) -> StoreResult<Vec<(Booking, Option<Payment>)>>;

    /// Bookings on listings owned by `host_id` that match `query`, latest
    /// check-in first.
    async fn list_host_bookings(
        &self,
        host_id: &str,
        query: &HostBookingQuery,
    ) -> StoreResult<Vec<HostBooking>>;

    async fn get_payment(&self, booking_id: Uuid) -> StoreResult<Option<Payment>>;

    async fn find_booking_by_session(&self, session_id: &str) -> StoreResult<Option<Booking>>;

    async fn find_booking_by_payment_ref(&self, payment_ref: &str) -> StoreResult<Option<Uuid>>;

    async fn set_provider_session(&self, booking_id: Uuid, session_id: &str) -> StoreResult<()>;

    /// Move every pending booking whose hold lapsed at or before `now` to
    /// expired in one conditional update. Returns the ids that moved.
    async fn expire_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;
}

/// A serializable unit of work. Dropping it without `commit` rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Lock the listing row so concurrent bookings on it serialize.
    async fn lock_listing(&mut self, id: Uuid) -> StoreResult<Option<Listing>>;

    async fn availability(
        &mut self,
        listing_id: Uuid,
        range: &DateRange,
    ) -> StoreResult<Vec<AvailabilityDay>>;

    /// Paid and pending bookings on the listing whose dates overlap `range`.
    /// Hold freshness is left to the caller.
    async fn overlapping_bookings(
        &mut self,
        listing_id: Uuid,
        range: &DateRange,
    ) -> StoreResult<Vec<Booking>>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn lock_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>>;

    /// Conditional status write. Returns false when the row was no longer
    /// in `from`.
    async fn update_status(
        &mut self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<bool>;

    async fn get_payment(&mut self, booking_id: Uuid) -> StoreResult<Option<Payment>>;

    /// Insert or replace the payment row keyed by booking id.
    async fn upsert_payment(&mut self, payment: &Payment) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
