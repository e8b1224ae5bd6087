use crate::error::Result;
use crate::gateways::GatewaySubscription;
use crate::repo::{SubscriptionRow, SubscriptionSearch};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SubscriptionListQuery {
    pub search: Option<String>,
    pub sort_on: Option<String>,
    /// `ASC` or `DESC`; anything else sorts ascending.
    pub sort_by: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionListEntry {
    pub paymill_subscription_id: String,
    pub paymill_offer_id: String,
    pub paymill_payment_id: String,
    pub customer_name: String,
    pub global_process_id: String,
    pub active: bool,
}

impl From<SubscriptionRow> for SubscriptionListEntry {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            paymill_subscription_id: row.paymill_subscription_id,
            paymill_offer_id: row.paymill_offer_id,
            paymill_payment_id: row.paymill_payment_id,
            customer_name: row.customer.name,
            global_process_id: row.global_process_id,
            active: row.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionListResponse {
    pub data: Vec<SubscriptionListEntry>,
    pub total: i64,
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionListQuery>,
) -> Result<Json<SubscriptionListResponse>> {
    let page = query.page.unwrap_or(1).max(1) - 1;
    let per_page = query.per_page.unwrap_or(20).max(1);

    let search = SubscriptionSearch {
        search: query.search,
        sort_on: query.sort_on,
        sort_desc: query.sort_by.as_deref() == Some("DESC"),
        limit: per_page,
        offset: page * per_page,
    };

    let (rows, total) = state.subscription_service.get_subscription_list(&search).await?;

    Ok(Json(SubscriptionListResponse {
        data: rows.into_iter().map(Into::into).collect(),
        total,
    }))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<GatewaySubscription>> {
    let details = state
        .subscription_service
        .get_subscription_details(&subscription_id)
        .await?;

    Ok(Json(details))
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub reason: Option<String>,
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Query(query): Query<CancelQuery>,
) -> Result<Json<serde_json::Value>> {
    state
        .subscription_service
        .cancel_subscription(&subscription_id, query.reason.as_deref())
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
