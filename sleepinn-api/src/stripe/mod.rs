//! Stripe as the payment provider: hosted checkout, session lookup and
//! refunds over the REST API.

pub mod client;
pub mod types;

pub use client::{StripeClient, StripeError};
pub use types::*;
