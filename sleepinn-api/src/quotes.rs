use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use sleepinn_catalog::{money::to_minor_units, Quote};
use sleepinn_core::DateRange;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Body shared by `POST /quote` and `POST /bookings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayRequest {
    pub listing_id: Uuid,
    pub start: String,
    pub end: String,
    #[serde(default = "default_guests")]
    pub guests: i64,
}

fn default_guests() -> i64 {
    1
}

impl StayRequest {
    pub fn range(&self) -> Result<DateRange, AppError> {
        Ok(DateRange::parse(&self.start, &self.end)?)
    }

    pub fn guest_count(&self) -> Result<u32, AppError> {
        u32::try_from(self.guests)
            .ok()
            .filter(|guests| *guests >= 1)
            .ok_or_else(|| AppError::ValidationError("guests must be at least 1".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub listing_id: Uuid,
    pub currency: String,
    pub nights: u32,
    pub nightly_base: i64,
    pub effective_nightly: i64,
    pub mixed_pricing: bool,
    pub subtotal: i64,
    pub service_fee: i64,
    pub total: i64,
    pub meta: QuoteMeta,
}

#[derive(Debug, Serialize)]
pub struct QuoteMeta {
    pub start: String,
    pub end: String,
    pub guests: u32,
}

impl QuoteResponse {
    fn new(listing_id: Uuid, quote: Quote) -> Self {
        Self {
            listing_id,
            nights: quote.nights,
            nightly_base: to_minor_units(quote.nightly_base),
            effective_nightly: to_minor_units(quote.effective_nightly),
            mixed_pricing: quote.mixed_pricing,
            subtotal: to_minor_units(quote.subtotal),
            service_fee: to_minor_units(quote.service_fee),
            total: to_minor_units(quote.total),
            meta: QuoteMeta {
                start: quote.range.start().to_string(),
                end: quote.range.end().to_string(),
                guests: quote.guests,
            },
            currency: quote.currency,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/quote", post(quote_stay))
}

async fn quote_stay(
    State(state): State<AppState>,
    Json(req): Json<StayRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let range = req.range()?;
    let guests = req.guest_count()?;

    let quote = state.bookings.quote(req.listing_id, &range, guests).await?;
    Ok(Json(QuoteResponse::new(req.listing_id, quote)))
}
