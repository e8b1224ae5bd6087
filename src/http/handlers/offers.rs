use crate::error::Result;
use crate::gateways::GatewayOffer;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct OfferListQuery {
    /// 1-based page number, as grids send it.
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OfferListResponse {
    pub data: Vec<GatewayOffer>,
    pub total: i64,
}

pub async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<OfferListQuery>,
) -> Result<Json<OfferListResponse>> {
    let page = query.page.unwrap_or(1).max(1) - 1;
    let per_page = query.per_page.unwrap_or(20);

    let data = state.offer_service.get_offer_list(page, per_page).await?;
    let total = data.len() as i64;

    Ok(Json(OfferListResponse { data, total }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteOfferQuery {
    #[serde(default)]
    pub remove_with_subscriptions: bool,
}

pub async fn delete_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<String>,
    Query(query): Query<DeleteOfferQuery>,
) -> Result<Json<serde_json::Value>> {
    state
        .offer_service
        .delete_offer(&offer_id, query.remove_with_subscriptions)
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
