use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::post,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{customer_auth_middleware, CustomerClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/payments/checkout/{booking_id}", post(start_checkout))
        .route("/payments/sync/{booking_id}", post(sync_payment))
        .route_layer(from_fn_with_state(state, customer_auth_middleware))
}

async fn start_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let redirect_url = state.checkout.start_checkout(booking_id, &claims.sub).await?;
    Ok(Json(json!({ "redirectUrl": redirect_url })))
}

/// Poll the provider for a checkout the webhook may not have reported yet.
async fn sync_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let status = state.checkout.sync_payment(booking_id, &claims.sub).await?;
    Ok(Json(json!({ "status": status })))
}
