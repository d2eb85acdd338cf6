//! Stripe API types. Only the fields the booking flow reads.

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// Booking id from `metadata[bookingId]`, falling back to the client
    /// reference.
    pub fn booking_id(&self) -> Option<Uuid> {
        self.metadata
            .get("bookingId")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

impl From<CheckoutSession> for sleepinn_core::CheckoutSession {
    fn from(session: CheckoutSession) -> Self {
        let paid = session.is_paid();
        let booking_id = session.booking_id();
        Self {
            id: session.id,
            url: session.url,
            paid,
            payment_ref: session.payment_intent,
            amount_total: session.amount_total,
            currency: session.currency,
            booking_id,
        }
    }
}

/// Stripe refund object.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

/// Stripe charge object, as delivered with `charge.refunded`.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    /// True only once the full amount is refunded.
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub refunds: Option<StripeList<Refund>>,
}

impl Charge {
    pub fn latest_refund_id(&self) -> Option<&str> {
        self.refunds
            .as_ref()
            .and_then(|list| list.data.first())
            .map(|refund| refund.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}
