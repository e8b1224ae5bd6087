use crate::config::AppConfig;
use crate::domain::money::to_minor_units;
use crate::domain::order::Order;
use crate::error::{Error, Result};
use crate::gateways::{GatewayOffer, PaymillApi};
use crate::repo::OffersStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Manages Paymill offers (recurring price plans) and their local mirror.
#[derive(Clone)]
pub struct OfferService {
    pub api: Arc<dyn PaymillApi>,
    pub offers: Arc<dyn OffersStore>,
    pub config: AppConfig,
}

/// Deduplication hash for an order's plan: two orders with the same customer
/// language, total and product set share one gateway offer.
pub fn identification_hash(order: &Order) -> String {
    let product_ids = order
        .sorted_product_ids()
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut hasher = Sha256::new();
    hasher.update(order.customer.lang.as_bytes());
    hasher.update(format!("{:.2}", order.price_sum).as_bytes());
    hasher.update(product_ids.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl OfferService {
    /// Returns the Paymill offer id for the order's plan, creating the offer
    /// at the gateway only when no order with the same identification hash
    /// has done so before.
    pub async fn create_offer_from_order(&self, order: &mut Order) -> Result<String> {
        if let Some(offer_id) = &order.payment_data.offer_id {
            return Ok(offer_id.clone());
        }

        let hash = identification_hash(order);

        if let Some(existing) = self.offers.find_by_hash(&hash).await? {
            order.payment_data.offer_id = Some(existing.paymill_id.clone());
            return Ok(existing.paymill_id);
        }

        let article = order.plan_article().ok_or(Error::NoPlanProduct)?;
        let plan = order.plan.as_ref().ok_or(Error::NoPlanProduct)?;

        let offer = self
            .api
            .create_offer(
                &article.title,
                to_minor_units(order.price_sum),
                &order.currency,
                &plan.invoice_interval.gateway_format(),
            )
            .await?;

        // Upsert-or-fetch: when a concurrent request created the row first,
        // the surviving Paymill id wins and our freshly created offer is
        // simply never referenced again.
        let row = self.offers.insert(&offer.id, &hash).await?;

        tracing::info!(offer = %row.paymill_id, "offer ready");

        order.payment_data.offer_id = Some(row.paymill_id.clone());
        Ok(row.paymill_id)
    }

    pub async fn delete_offer(&self, offer_id: &str, remove_with_subscriptions: bool) -> Result<()> {
        if !self.config.api.is_api_set_up() {
            return Err(Error::Setup);
        }

        self.api
            .delete_offer(offer_id, remove_with_subscriptions)
            .await
    }

    /// One page of offers straight from the gateway; the mirror only stores
    /// the identification hash, not the offer details.
    pub async fn get_offer_list(&self, page: i64, page_size: i64) -> Result<Vec<GatewayOffer>> {
        if !self.config.api.is_api_set_up() {
            return Err(Error::Setup);
        }

        let page = page.max(0);
        let page_size = page_size.max(1);

        self.api.list_offers(page_size, page * page_size).await
    }
}
