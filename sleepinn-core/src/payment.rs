use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub booking_id: Uuid,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Provider view of a hosted checkout session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub paid: bool,
    pub payment_ref: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub id: String,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("provider unreachable: {0}")]
    Unavailable(String),
    #[error("unexpected provider response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Open a hosted checkout session for a pending booking.
    async fn create_checkout(&self, request: &CheckoutRequest)
        -> Result<CheckoutSession, PaymentError>;

    /// Retrieve the current state of a checkout session.
    async fn get_checkout(&self, session_id: &str) -> Result<CheckoutSession, PaymentError>;

    /// Refund a captured payment in full. Repeating a call with the same
    /// idempotency key must not refund twice.
    async fn refund(
        &self,
        payment_ref: &str,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, PaymentError>;
}
