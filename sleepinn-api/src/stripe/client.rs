//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sleepinn_core::{CheckoutRequest, PaymentAdapter, PaymentError, RefundReceipt};
use tracing::{debug, info};

use super::types::{CheckoutSession, Refund, StripeErrorResponse};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error ({status}): {error_type} - {message}")]
    Api {
        status: u16,
        error_type: String,
        message: String,
        code: Option<String>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<StripeError> for PaymentError {
    fn from(err: StripeError) -> Self {
        let message = err.to_string();
        match err {
            StripeError::Http(e) if e.is_decode() => PaymentError::Malformed(message),
            StripeError::Http(_) => PaymentError::Unavailable(message),
            StripeError::Api { status, .. } if status >= 500 || status == 429 => {
                PaymentError::Unavailable(message)
            }
            StripeError::Api { .. } | StripeError::Configuration(_) => {
                PaymentError::Rejected(message)
            }
        }
    }
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StripeError::Configuration("empty API key".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the client somewhere other than api.stripe.com.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a one-line-item Checkout session in payment mode for a booking.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let booking_id = request.booking_id.to_string();
        let params = vec![
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", booking_id.clone()),
            ("line_items[0][price_data][currency]", request.currency.to_lowercase()),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount.to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[bookingId]", booking_id.clone()),
            ("payment_intent_data[metadata][bookingId]", booking_id),
        ];

        debug!(
            booking_id = %request.booking_id,
            amount = request.amount,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Retrieve a Checkout session by ID.
    pub async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.base_url, session_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Refund a payment intent in full. Stripe replays the original response
    /// for a repeated `Idempotency-Key`.
    pub async fn create_refund(
        &self,
        payment_intent: &str,
        idempotency_key: &str,
    ) -> Result<Refund, StripeError> {
        let params = [
            ("payment_intent", payment_intent),
            ("reason", "requested_by_customer"),
        ];

        let response = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .header("Idempotency-Key", idempotency_key)
            .form(&params)
            .send()
            .await?;

        let refund: Refund = self.handle_response(response).await?;
        info!(refund_id = %refund.id, payment_intent = %payment_intent, "Stripe refund issued");
        Ok(refund)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                status: status.as_u16(),
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                status: status.as_u16(),
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[async_trait]
impl PaymentAdapter for StripeClient {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<sleepinn_core::CheckoutSession, PaymentError> {
        Ok(self.create_checkout_session(request).await?.into())
    }

    async fn get_checkout(
        &self,
        session_id: &str,
    ) -> Result<sleepinn_core::CheckoutSession, PaymentError> {
        Ok(self.get_checkout_session(session_id).await?.into())
    }

    async fn refund(
        &self,
        payment_ref: &str,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, PaymentError> {
        let refund = self.create_refund(payment_ref, idempotency_key).await?;
        Ok(RefundReceipt {
            id: refund.id,
            status: refund.status.unwrap_or_else(|| "pending".to_string()),
        })
    }
}
