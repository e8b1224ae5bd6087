//! In-memory implementations of the host-ERP collaborator traits, used by
//! the service tests.

use crate::domain::invoice::Invoice;
use crate::domain::ledger::{LedgerKind, LedgerStatus, LedgerTransaction, NewLedgerTransaction};
use crate::domain::order::Order;
use crate::erp::{InvoiceStore, Ledger, OrderStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryOrderStore {
    pub orders: Mutex<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn with_order(order: Order) -> Self {
        let store = Self::default();
        store.orders.lock().unwrap().insert(order.hash.clone(), order);
        store
    }
}

#[async_trait::async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get_by_hash(&self, hash: &str) -> Result<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(hash).cloned())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        self.orders
            .lock()
            .unwrap()
            .insert(order.hash.clone(), order.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryInvoiceStore {
    pub invoices: Mutex<HashMap<String, Invoice>>,
}

impl MemoryInvoiceStore {
    pub fn with_invoices(invoices: Vec<Invoice>) -> Self {
        let map = invoices.into_iter().map(|i| (i.id.clone(), i)).collect();
        Self {
            invoices: Mutex::new(map),
        }
    }
}

#[async_trait::async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn get(&self, id: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices.lock().unwrap().get(id).cloned())
    }

    async fn list_unpaid_by_payment_types(&self, payment_types: &[String]) -> Result<Vec<Invoice>> {
        let mut found: Vec<Invoice> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|i| !i.paid && payment_types.contains(&i.payment_type))
            .cloned()
            .collect();

        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn attach_transaction(&self, invoice_id: &str, ledger_transaction_id: Uuid) -> Result<()> {
        if let Some(invoice) = self.invoices.lock().unwrap().get_mut(invoice_id) {
            invoice.ledger_transaction_ids.push(ledger_transaction_id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    pub transactions: Mutex<HashMap<Uuid, LedgerTransaction>>,
}

impl MemoryLedger {
    fn insert(&self, kind: LedgerKind, input: NewLedgerTransaction) -> LedgerTransaction {
        let tx = LedgerTransaction {
            id: Uuid::new_v4(),
            kind,
            amount: input.amount,
            currency: input.currency,
            hash: input.hash,
            global_process_id: input.global_process_id,
            status: LedgerStatus::Pending,
            gateway_transaction_id: None,
            gateway_refund_id: None,
            message: input.message,
        };

        self.transactions.lock().unwrap().insert(tx.id, tx.clone());
        tx
    }

    pub fn all(&self) -> Vec<LedgerTransaction> {
        self.transactions.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn create_payment_transaction(
        &self,
        input: NewLedgerTransaction,
    ) -> Result<LedgerTransaction> {
        Ok(self.insert(LedgerKind::Payment, input))
    }

    async fn create_refund_transaction(
        &self,
        input: NewLedgerTransaction,
    ) -> Result<LedgerTransaction> {
        Ok(self.insert(LedgerKind::Refund, input))
    }

    async fn get(&self, id: Uuid) -> Result<Option<LedgerTransaction>> {
        Ok(self.transactions.lock().unwrap().get(&id).cloned())
    }

    async fn set_status(&self, id: Uuid, status: LedgerStatus) -> Result<()> {
        if let Some(tx) = self.transactions.lock().unwrap().get_mut(&id) {
            tx.status = status;
        }
        Ok(())
    }

    async fn set_gateway_ids(
        &self,
        id: Uuid,
        gateway_transaction_id: Option<&str>,
        gateway_refund_id: Option<&str>,
    ) -> Result<()> {
        if let Some(tx) = self.transactions.lock().unwrap().get_mut(&id) {
            if let Some(t) = gateway_transaction_id {
                tx.gateway_transaction_id = Some(t.to_string());
            }
            if let Some(r) = gateway_refund_id {
                tx.gateway_refund_id = Some(r.to_string());
            }
        }
        Ok(())
    }
}
