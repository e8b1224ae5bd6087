use crate::domain::order::Customer;
use crate::gateways::{GatewayTransaction, TransactionStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod offers_repo;
pub mod subscription_transactions_repo;
pub mod subscriptions_repo;

#[derive(Debug, Clone)]
pub struct OfferRow {
    pub paymill_id: String,
    pub identification_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionRow {
    pub paymill_subscription_id: String,
    pub paymill_offer_id: String,
    pub paymill_payment_id: String,
    pub customer: Customer,
    pub global_process_id: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct SubscriptionTransactionRow {
    pub paymill_transaction_id: String,
    pub paymill_subscription_id: String,
    pub data: GatewayTransaction,
    pub transaction_date: DateTime<Utc>,
    pub global_process_id: String,
    pub ledger_transaction_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionSearch {
    /// Substring match on the global process id.
    pub search: Option<String>,
    pub sort_on: Option<String>,
    pub sort_desc: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Local mirror of gateway offers, keyed by the identification hash.
#[async_trait::async_trait]
pub trait OffersStore: Send + Sync {
    async fn find_by_hash(&self, identification_hash: &str) -> Result<Option<OfferRow>>;

    /// Insert-or-fetch-existing on the identification hash: when another
    /// request got there first, the already-stored row is returned.
    async fn insert(&self, paymill_id: &str, identification_hash: &str) -> Result<OfferRow>;
}

/// Local mirror of gateway subscriptions, for listing and search only; the
/// gateway is the authority on subscription state.
#[async_trait::async_trait]
pub trait SubscriptionsStore: Send + Sync {
    /// Insert-or-ignore on the unique subscription id.
    async fn insert(&self, row: &SubscriptionRow) -> Result<()>;

    async fn get(&self, subscription_id: &str) -> Result<Option<SubscriptionRow>>;

    async fn set_active(&self, subscription_id: &str, active: bool) -> Result<()>;

    async fn list(&self, search: &SubscriptionSearch) -> Result<(Vec<SubscriptionRow>, i64)>;

    async fn ids(&self, include_inactive: bool) -> Result<Vec<String>>;

    async fn by_global_process_ids(&self, ids: &[String]) -> Result<Vec<SubscriptionRow>>;
}

/// Cache of gateway transactions belonging to subscriptions.
#[async_trait::async_trait]
pub trait SubscriptionTransactionsStore: Send + Sync {
    /// Cached rows with the given status and no linked ledger transaction,
    /// oldest first.
    async fn unprocessed(
        &self,
        subscription_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<SubscriptionTransactionRow>>;

    async fn latest_transaction_date(
        &self,
        subscription_id: &str,
    ) -> Result<Option<DateTime<Utc>>>;

    /// De-duplicated on `(transaction id, transaction date)`.
    async fn insert_if_absent(&self, row: &SubscriptionTransactionRow) -> Result<()>;

    /// Marks a cached transaction as reconciled.
    async fn link_ledger_transaction(
        &self,
        paymill_transaction_id: &str,
        transaction_date: DateTime<Utc>,
        ledger_transaction_id: Uuid,
    ) -> Result<()>;
}
