use crate::error::Result;
use crate::service::subscription_service::ConfirmSubscriptionData;
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub order_hash: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
}

/// One-shot card checkout for a regular order.
pub async fn checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    state
        .payment_service
        .checkout(&req.order_hash, &req.token)
        .await?;

    Ok(Json(CheckoutResponse { success: true }))
}

/// Checkout for a plan order: creates the gateway subscription.
pub async fn recurring_checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    state
        .subscription_service
        .create_subscription(&req.order_hash, &req.token)
        .await?;

    Ok(Json(CheckoutResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub order_hash: String,
}

/// Sum and billing cadence shown before the buyer confirms a subscription.
pub async fn confirm_subscription_data(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<ConfirmSubscriptionData>> {
    let data = state
        .subscription_service
        .get_confirm_subscription_data(&query.order_hash)
        .await?;

    Ok(Json(data))
}
