use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use sleepinn_core::BookingStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod crypto;
pub mod error;
pub mod host;
pub mod metrics;
pub mod middleware;
pub mod payments;
pub mod quotes;
pub mod state;
pub mod stripe;
pub mod webhooks;
pub mod worker;

pub use error::AppError;
pub use state::{AppSettings, AppState};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .merge(quotes::routes())
        .merge(webhooks::routes())
        .merge(bookings::routes(state.clone()))
        .merge(payments::routes(state.clone()))
        .merge(host::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false })))
        }
    }
}

async fn render_metrics(State(state): State<AppState>) -> Result<String, AppError> {
    state
        .metrics
        .render()
        .map_err(|e| AppError::from(anyhow::Error::new(e).context("encoding metrics")))
}
