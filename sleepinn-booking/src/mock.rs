use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sleepinn_core::{CheckoutRequest, CheckoutSession, PaymentAdapter, PaymentError, RefundReceipt};

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, CheckoutSession>,
    refunds: Vec<(String, String)>,
    fail_refunds: bool,
}

/// In-process payment provider for local runs and tests.
#[derive(Default)]
pub struct MockPaymentAdapter {
    state: Mutex<MockState>,
}

impl MockPaymentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate the guest finishing the hosted checkout.
    pub fn complete(&self, session_id: &str, payment_ref: &str) {
        if let Some(session) = self.state().sessions.get_mut(session_id) {
            session.paid = true;
            session.payment_ref = Some(payment_ref.to_string());
        }
    }

    pub fn fail_refunds(&self, fail: bool) {
        self.state().fail_refunds = fail;
    }

    pub fn session(&self, session_id: &str) -> Option<CheckoutSession> {
        self.state().sessions.get(session_id).cloned()
    }

    /// `(payment_ref, idempotency_key)` of every distinct refund issued.
    pub fn refunds(&self) -> Vec<(String, String)> {
        self.state().refunds.clone()
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let id = format!("cs_mock_{}", request.booking_id.simple());
        let session = CheckoutSession {
            id: id.clone(),
            url: Some(format!("https://checkout.mock/{id}")),
            paid: false,
            payment_ref: None,
            amount_total: Some(request.amount),
            currency: Some(request.currency.clone()),
            booking_id: Some(request.booking_id),
        };
        self.state().sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn get_checkout(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        self.session(session_id)
            .ok_or_else(|| PaymentError::Rejected(format!("No such checkout session: {session_id}")))
    }

    async fn refund(&self, payment_ref: &str, idempotency_key: &str) -> Result<RefundReceipt, PaymentError> {
        let mut state = self.state();
        if state.fail_refunds {
            return Err(PaymentError::Rejected(format!("Charge {payment_ref} cannot be refunded")));
        }
        let already = state.refunds.iter().any(|(_, key)| key == idempotency_key);
        if !already {
            state
                .refunds
                .push((payment_ref.to_string(), idempotency_key.to_string()));
        }
        Ok(RefundReceipt {
            id: format!("re_mock_{idempotency_key}"),
            status: "succeeded".to_string(),
        })
    }
}
