use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use sleepinn_booking::{ConfirmOutcome, PaymentConfirmation, RefundOutcome};
use sleepinn_core::Clock;
use tracing::{info, warn};

use crate::crypto::verify_signature;
use crate::error::AppError;
use crate::state::AppState;
use crate::stripe::{Charge, CheckoutSession, Event};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(payment_webhook))
}

// ============================================================================
// Entry point
// ============================================================================

/// Verifies the provider signature over the raw body, then feeds the event
/// to the reconciler. Transient store failures surface as 503 so the
/// provider redelivers.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let Some(secret) = state.webhook.secret.as_deref() else {
        return Err(AppError::ServiceUnavailable(
            "webhook signing secret not configured".to_string(),
        ));
    };

    let invalid = || AppError::ValidationError("invalid signature".to_string());

    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook without signature header");
            invalid()
        })?;

    let now = state.clock.now().timestamp();
    verify_signature(header, &body, secret, now, state.webhook.tolerance_seconds).map_err(|e| {
        warn!(error = %e, "Rejected webhook signature");
        invalid()
    })?;

    let event: Event = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("malformed event: {e}")))?;

    info!(event_id = %event.id, event_type = %event.event_type, "Payment webhook received");

    let outcome = match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            on_checkout_completed(&state, event.data.object).await?
        }
        "charge.refunded" => on_charge_refunded(&state, event.data.object).await?,
        _ => "ignored",
    };

    state.metrics.payment_events.with_label_values(&[outcome]).inc();
    Ok(Json(json!({ "received": true })))
}

// ============================================================================
// Event handlers
// ============================================================================

async fn on_checkout_completed(state: &AppState, object: Value) -> Result<&'static str, AppError> {
    let session: CheckoutSession = serde_json::from_value(object)
        .map_err(|e| AppError::ValidationError(format!("malformed checkout session: {e}")))?;

    if !session.is_paid() {
        info!(session_id = %session.id, "Checkout completed without payment yet");
        return Ok("unpaid");
    }

    let confirmation = PaymentConfirmation {
        booking_id: session.booking_id(),
        payment_ref: session.payment_intent.clone().unwrap_or_else(|| session.id.clone()),
        session_id: Some(session.id),
        amount: session.amount_total.unwrap_or_default(),
        currency: session.currency.unwrap_or_default(),
    };

    let outcome = match state.reconciler.on_payment_confirmed(&confirmation).await? {
        ConfirmOutcome::Paid(_) => "paid",
        ConfirmOutcome::AlreadyPaid(_) | ConfirmOutcome::Ignored { .. } => "duplicate",
        ConfirmOutcome::Unpayable { .. } => "anomaly",
        ConfirmOutcome::UnknownBooking => "unknown_booking",
    };
    Ok(outcome)
}

async fn on_charge_refunded(state: &AppState, object: Value) -> Result<&'static str, AppError> {
    let charge: Charge = serde_json::from_value(object)
        .map_err(|e| AppError::ValidationError(format!("malformed charge: {e}")))?;

    if !charge.refunded {
        info!(
            charge_id = %charge.id,
            amount_refunded = charge.amount_refunded,
            amount = charge.amount,
            "Partial refund left for manual handling"
        );
        return Ok("ignored");
    }

    let Some(payment_ref) = charge.payment_intent.as_deref() else {
        warn!(charge_id = %charge.id, "Refunded charge without payment intent");
        return Ok("unknown_booking");
    };

    let outcome = match state
        .reconciler
        .on_refund_for_payment(payment_ref, charge.latest_refund_id())
        .await?
    {
        RefundOutcome::Refunded(_) => "refunded",
        RefundOutcome::AlreadyRefunded(_) => "duplicate",
        RefundOutcome::NotPaid { .. } => "anomaly",
        RefundOutcome::UnknownBooking => "unknown_booking",
    };
    Ok(outcome)
}
