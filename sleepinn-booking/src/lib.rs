pub mod checkout;
pub mod conflict;
pub mod lifecycle;
pub mod mock;
pub mod reconciler;
pub mod service;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use checkout::CheckoutService;
pub use conflict::ConflictChecker;
pub use lifecycle::CancelDecision;
pub use mock::MockPaymentAdapter;
pub use reconciler::{ConfirmOutcome, PaymentConfirmation, PaymentReconciler, RefundOutcome};
pub use service::{BookingPolicy, BookingService, CreatedBooking, NewBooking};
pub use sweeper::PendingSweeper;
