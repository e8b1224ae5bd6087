use crate::domain::invoice::Invoice;
use crate::domain::ledger::{LedgerStatus, LedgerTransaction, NewLedgerTransaction};
use crate::domain::order::Order;
use anyhow::Result;
use uuid::Uuid;

pub mod memory;
pub mod pg;

/// Order access as the host ERP exposes it: lookup by hash, persist payment
/// data and history.
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_by_hash(&self, hash: &str) -> Result<Option<Order>>;

    async fn save(&self, order: &Order) -> Result<()>;
}

#[async_trait::async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Invoice>>;

    /// All unpaid invoices using one of the given payment types.
    async fn list_unpaid_by_payment_types(&self, payment_types: &[String]) -> Result<Vec<Invoice>>;

    async fn attach_transaction(&self, invoice_id: &str, ledger_transaction_id: Uuid) -> Result<()>;
}

/// The host ERP's accounting ledger.
///
/// Transactions are created `Pending`; callers move them to `Complete` or
/// `Error` exactly once.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    async fn create_payment_transaction(
        &self,
        input: NewLedgerTransaction,
    ) -> Result<LedgerTransaction>;

    async fn create_refund_transaction(
        &self,
        input: NewLedgerTransaction,
    ) -> Result<LedgerTransaction>;

    async fn get(&self, id: Uuid) -> Result<Option<LedgerTransaction>>;

    async fn set_status(&self, id: Uuid, status: LedgerStatus) -> Result<()>;

    async fn set_gateway_ids(
        &self,
        id: Uuid,
        gateway_transaction_id: Option<&str>,
        gateway_refund_id: Option<&str>,
    ) -> Result<()>;
}
