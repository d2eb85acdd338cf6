use std::sync::Arc;

use rust_decimal::Decimal;
use sleepinn_booking::{
    BookingPolicy, BookingService, CheckoutService, PaymentReconciler, PendingSweeper,
};
use sleepinn_catalog::QuoteEngine;
use sleepinn_core::{BookingStore, Clock, PaymentAdapter};
use sleepinn_store::Config;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct WebhookConfig {
    /// Webhooks are refused with 503 while unset.
    pub secret: Option<String>,
    pub tolerance_seconds: i64,
}

/// Knobs the services are built from. Mirrors the `booking`, `payments`
/// and `auth` config sections.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub jwt_secret: String,
    pub hold: chrono::Duration,
    pub service_fee_rate: Decimal,
    pub transaction_retries: u32,
    pub public_url: String,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_seconds: i64,
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.auth.jwt_secret.clone(),
            hold: chrono::Duration::minutes(config.booking.hold_minutes),
            service_fee_rate: config.booking.service_fee_rate,
            transaction_retries: config.booking.transaction_retries,
            public_url: config.payments.public_url.clone(),
            webhook_secret: config.payments.stripe_webhook_secret.clone(),
            webhook_tolerance_seconds: config.payments.webhook_tolerance_seconds,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub clock: Arc<dyn Clock>,
    pub bookings: Arc<BookingService>,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub sweeper: Arc<PendingSweeper>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub webhook: WebhookConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        payments: Option<Arc<dyn PaymentAdapter>>,
        settings: AppSettings,
    ) -> Result<Self, prometheus::Error> {
        let reconciler = Arc::new(PaymentReconciler::new(
            store.clone(),
            clock.clone(),
            settings.transaction_retries,
        ));
        let bookings = Arc::new(BookingService::new(
            store.clone(),
            QuoteEngine::new(settings.service_fee_rate),
            clock.clone(),
            payments.clone(),
            reconciler.clone(),
            BookingPolicy {
                hold: settings.hold,
                transaction_retries: settings.transaction_retries,
            },
        ));
        let checkout = Arc::new(CheckoutService::new(
            store.clone(),
            clock.clone(),
            payments,
            reconciler.clone(),
            &settings.public_url,
        ));
        let sweeper = Arc::new(PendingSweeper::new(store.clone(), clock.clone()));

        Ok(Self {
            store,
            clock,
            bookings,
            checkout,
            reconciler,
            sweeper,
            metrics: Arc::new(Metrics::new()?),
            auth: AuthConfig {
                secret: settings.jwt_secret,
            },
            webhook: WebhookConfig {
                secret: settings.webhook_secret,
                tolerance_seconds: settings.webhook_tolerance_seconds,
            },
        })
    }
}
