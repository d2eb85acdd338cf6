use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sleepinn_api::{app, stripe::StripeClient, worker, AppSettings, AppState};
use sleepinn_core::{BookingStore, Clock, PaymentAdapter, SystemClock};
use sleepinn_store::{Config, DbClient, PgStore};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sleepinn_api=debug,sleepinn_booking=debug,tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting sleepinn API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let store: Arc<dyn BookingStore> = Arc::new(PgStore::new(db.pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let payments: Option<Arc<dyn PaymentAdapter>> = match &config.payments.stripe_secret_key {
        Some(key) => {
            let mut client = StripeClient::new(key.clone()).context("Failed to build Stripe client")?;
            if let Some(base) = &config.payments.stripe_api_base {
                client = client.with_base_url(base.clone());
            }
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("No Stripe key configured: checkout disabled, refunds settle locally");
            None
        }
    };
    if config.payments.stripe_webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured: payment webhooks will be refused");
    }

    let state = AppState::new(store, clock, payments, AppSettings::from_config(&config))
        .context("Failed to register metrics")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(worker::start_pending_sweeper(
        state.sweeper.clone(),
        state.metrics.clone(),
        Duration::from_secs(config.booking.sweeper_interval_seconds),
        shutdown_rx,
    ));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    sweeper.await.context("Sweeper task panicked")?;
    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
