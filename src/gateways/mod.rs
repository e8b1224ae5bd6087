use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod mock;
pub mod paymill;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Open,
    Pending,
    Closed,
    Failed,
    PartialRefunded,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Open => "open",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Closed => "closed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::PartialRefunded => "partial_refunded",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Canceled,
    Failed,
    Expired,
    #[serde(other)]
    Unknown,
}

/// Normalized gateway transaction, decoded once at the adapter boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub id: String,
    pub status: TransactionStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub response_code: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: TransactionStatus,
    pub amount_minor: i64,
}

/// A tokenized payment method ("Payment" in Paymill terms).
///
/// `recurring` carries the eligibility flag the typed SDK response omits; the
/// adapter reads it from the raw payload so callers never have to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentMethod {
    pub id: String,
    pub recurring: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOffer {
    pub id: String,
    pub name: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub offer_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub next_capture_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub offer_id: String,
    pub payment_method_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub name: String,
    /// Gateway interval notation, e.g. `"11 MONTH"`. Only set for
    /// non-auto-extending plans.
    pub period_of_validity: Option<String>,
}

/// The Paymill REST API surface this integration uses.
///
/// Every method returns a normalized response; gateway-reported errors come
/// back as `Error::GatewayApi`, transport failures as `Error::Generic`.
#[async_trait::async_trait]
pub trait PaymillApi: Send + Sync {
    async fn create_transaction(
        &self,
        token: &str,
        amount_minor: i64,
        currency: &str,
        description: &str,
    ) -> Result<GatewayTransaction>;

    async fn create_refund(
        &self,
        transaction_id: &str,
        amount_minor: i64,
        description: &str,
    ) -> Result<GatewayRefund>;

    async fn create_payment_method(&self, token: &str) -> Result<GatewayPaymentMethod>;

    async fn delete_payment_method(&self, payment_method_id: &str) -> Result<()>;

    async fn create_offer(
        &self,
        name: &str,
        amount_minor: i64,
        currency: &str,
        interval: &str,
    ) -> Result<GatewayOffer>;

    async fn delete_offer(&self, offer_id: &str, remove_with_subscriptions: bool) -> Result<()>;

    async fn list_offers(&self, count: i64, offset: i64) -> Result<Vec<GatewayOffer>>;

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<()>;

    async fn get_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription>;

    async fn list_transactions(
        &self,
        payment_method_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<GatewayTransaction>>;
}
