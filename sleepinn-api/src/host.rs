use axum::{
    extract::{Query, State},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sleepinn_core::{BookingStatus, HostBooking, HostBookingTab, PaymentStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{customer_auth_middleware, CustomerClaims};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HostBookingsParams {
    pub tab: Option<String>,
    pub q: Option<String>,
}

impl HostBookingsParams {
    fn tab(&self) -> Result<HostBookingTab, AppError> {
        match self.tab.as_deref() {
            None | Some("") => Ok(HostBookingTab::default()),
            Some(raw) => raw.parse().map_err(AppError::ValidationError),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBookingView {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub listing_title: String,
    pub guest_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub guests: u32,
    pub status: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
    /// Minor units; the captured payment when there is one.
    pub amount: i64,
    pub currency: String,
}

impl From<HostBooking> for HostBookingView {
    fn from(found: HostBooking) -> Self {
        let HostBooking {
            booking,
            payment,
            listing_title,
        } = found;
        let (amount, currency) = match &payment {
            Some(p) => (p.amount, p.currency.clone()),
            None => (booking.amount, booking.currency.clone()),
        };
        Self {
            id: booking.id,
            listing_id: booking.listing_id,
            listing_title,
            guest_id: booking.user_id,
            start: booking.range.start(),
            end: booking.range.end(),
            guests: booking.guest_count,
            status: booking.status,
            payment_status: payment.map(|p| p.status),
            amount,
            currency,
        }
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/host/bookings", get(host_bookings))
        .route_layer(from_fn_with_state(state, customer_auth_middleware))
}

/// GET /host/bookings?tab=upcoming|past|all&q=
async fn host_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Query(params): Query<HostBookingsParams>,
) -> Result<Json<Vec<HostBookingView>>, AppError> {
    let found = state
        .bookings
        .list_host_bookings(&claims.sub, params.tab()?, params.q.as_deref())
        .await?;
    Ok(Json(found.into_iter().map(HostBookingView::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_defaults_to_upcoming_and_rejects_unknown() {
        let params = HostBookingsParams::default();
        assert_eq!(params.tab().unwrap(), HostBookingTab::Upcoming);

        let params = HostBookingsParams {
            tab: Some("past".to_string()),
            q: None,
        };
        assert_eq!(params.tab().unwrap(), HostBookingTab::Past);

        let params = HostBookingsParams {
            tab: Some("soon".to_string()),
            q: None,
        };
        assert!(matches!(params.tab(), Err(AppError::ValidationError(_))));
    }
}
