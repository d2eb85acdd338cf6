pub mod booking;
pub mod clock;
pub mod dates;
pub mod host;
pub mod listing;
pub mod payment;
pub mod repository;

use chrono::NaiveDate;

pub use booking::{Booking, BookingStatus, Payment, PaymentStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dates::DateRange;
pub use host::{HostBooking, HostBookingQuery, HostBookingTab};
pub use listing::{AvailabilityDay, Listing};
pub use payment::{CheckoutRequest, CheckoutSession, PaymentAdapter, PaymentError, RefundReceipt};
pub use repository::{BookingStore, StoreError, StoreResult, StoreTx};

/// Error taxonomy shared by every booking-facing operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Unavailable on {} day(s)", missing_days.len())]
    Unavailable { missing_days: Vec<NaiveDate> },
    #[error("Dates are no longer available")]
    Conflict,
    #[error("{0}")]
    IllegalTransition(String),
    #[error("Not allowed to access this booking")]
    Forbidden,
    #[error("Payment provider error: {0}")]
    UpstreamPayment(String),
    #[error("Payment provider is not configured")]
    PaymentsDisabled,
    #[error("Transient store failure: {0}")]
    TransientStore(String),
    #[error("Store failure: {0}")]
    Store(String),
}

impl CoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientStore(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) => CoreError::TransientStore(msg),
            StoreError::Database(msg) => CoreError::Store(msg),
        }
    }
}

impl From<PaymentError> for CoreError {
    fn from(err: PaymentError) -> Self {
        CoreError::UpstreamPayment(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
