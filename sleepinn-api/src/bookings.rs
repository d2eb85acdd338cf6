use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sleepinn_booking::NewBooking;
use sleepinn_core::{Booking, BookingStatus, Payment, PaymentStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{customer_auth_middleware, CustomerClaims};
use crate::quotes::StayRequest;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub guests: u32,
    pub status: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<(Booking, Option<Payment>)> for BookingView {
    fn from((booking, payment): (Booking, Option<Payment>)) -> Self {
        Self {
            id: booking.id,
            listing_id: booking.listing_id,
            start: booking.range.start(),
            end: booking.range.end(),
            guests: booking.guest_count,
            status: booking.status,
            payment_status: payment.map(|p| p.status),
            amount: booking.amount,
            currency: booking.currency,
            expires_at: booking.expires_at,
            created_at: booking.created_at,
        }
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/mine", get(my_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route_layer(from_fn_with_state(state, customer_auth_middleware))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<StayRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request = NewBooking {
        listing_id: req.listing_id,
        user_id: claims.sub,
        range: req.range()?,
        guests: req.guest_count()?,
    };

    let created = state.bookings.create_booking(&request).await?;
    let id = created.booking.id;

    if created.reused {
        return Ok((StatusCode::OK, Json(json!({ "id": id, "reused": true }))));
    }

    state.metrics.bookings_created.inc();
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let status = state.bookings.cancel_booking(id, &claims.sub).await?;
    Ok(Json(json!({ "status": status })))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, AppError> {
    let found = state.bookings.get_booking(id, &claims.sub).await?;
    Ok(Json(found.into()))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let bookings = state.bookings.list_bookings(&claims.sub).await?;
    Ok(Json(bookings.into_iter().map(BookingView::from).collect()))
}
