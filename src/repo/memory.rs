//! In-memory implementations of the mirror stores, used by the service tests.

use crate::gateways::TransactionStatus;
use crate::repo::{
    OfferRow, OffersStore, SubscriptionRow, SubscriptionSearch, SubscriptionTransactionRow,
    SubscriptionTransactionsStore, SubscriptionsStore,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryOffersStore {
    pub rows: Mutex<Vec<OfferRow>>,
}

#[async_trait::async_trait]
impl OffersStore for MemoryOffersStore {
    async fn find_by_hash(&self, identification_hash: &str) -> Result<Option<OfferRow>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.identification_hash == identification_hash)
            .cloned())
    }

    async fn insert(&self, paymill_id: &str, identification_hash: &str) -> Result<OfferRow> {
        let mut rows = self.rows.lock().unwrap();

        if let Some(existing) = rows
            .iter()
            .find(|r| r.identification_hash == identification_hash)
        {
            return Ok(existing.clone());
        }

        let row = OfferRow {
            paymill_id: paymill_id.to_string(),
            identification_hash: identification_hash.to_string(),
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }
}

#[derive(Default)]
pub struct MemorySubscriptionsStore {
    pub rows: Mutex<Vec<SubscriptionRow>>,
}

impl MemorySubscriptionsStore {
    pub fn with_rows(rows: Vec<SubscriptionRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }
}

#[async_trait::async_trait]
impl SubscriptionsStore for MemorySubscriptionsStore {
    async fn insert(&self, row: &SubscriptionRow) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();

        if !rows
            .iter()
            .any(|r| r.paymill_subscription_id == row.paymill_subscription_id)
        {
            rows.push(row.clone());
        }
        Ok(())
    }

    async fn get(&self, subscription_id: &str) -> Result<Option<SubscriptionRow>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.paymill_subscription_id == subscription_id)
            .cloned())
    }

    async fn set_active(&self, subscription_id: &str, active: bool) -> Result<()> {
        if let Some(row) = self
            .rows
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| r.paymill_subscription_id == subscription_id)
        {
            row.active = active;
        }
        Ok(())
    }

    async fn list(&self, search: &SubscriptionSearch) -> Result<(Vec<SubscriptionRow>, i64)> {
        let rows = self.rows.lock().unwrap();

        let matching: Vec<SubscriptionRow> = rows
            .iter()
            .filter(|r| match &search.search {
                Some(s) => r.global_process_id.contains(s.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(search.offset.max(0) as usize)
            .take(search.limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }

    async fn ids(&self, include_inactive: bool) -> Result<Vec<String>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.active || include_inactive)
            .map(|r| r.paymill_subscription_id.clone())
            .collect())
    }

    async fn by_global_process_ids(&self, ids: &[String]) -> Result<Vec<SubscriptionRow>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| ids.contains(&r.global_process_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemorySubscriptionTransactionsStore {
    pub rows: Mutex<Vec<SubscriptionTransactionRow>>,
}

impl MemorySubscriptionTransactionsStore {
    pub fn with_rows(rows: Vec<SubscriptionTransactionRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }
}

#[async_trait::async_trait]
impl SubscriptionTransactionsStore for MemorySubscriptionTransactionsStore {
    async fn unprocessed(
        &self,
        subscription_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<SubscriptionTransactionRow>> {
        let mut found: Vec<SubscriptionTransactionRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.paymill_subscription_id == subscription_id
                    && r.ledger_transaction_id.is_none()
                    && r.data.status == status
            })
            .cloned()
            .collect();

        found.sort_by_key(|r| r.transaction_date);
        Ok(found)
    }

    async fn latest_transaction_date(
        &self,
        subscription_id: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.paymill_subscription_id == subscription_id)
            .map(|r| r.transaction_date)
            .max())
    }

    async fn insert_if_absent(&self, row: &SubscriptionTransactionRow) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();

        let exists = rows.iter().any(|r| {
            r.paymill_transaction_id == row.paymill_transaction_id
                && r.transaction_date == row.transaction_date
        });

        if !exists {
            rows.push(row.clone());
        }
        Ok(())
    }

    async fn link_ledger_transaction(
        &self,
        paymill_transaction_id: &str,
        transaction_date: DateTime<Utc>,
        ledger_transaction_id: Uuid,
    ) -> Result<()> {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|r| {
            r.paymill_transaction_id == paymill_transaction_id
                && r.transaction_date == transaction_date
                && r.ledger_transaction_id.is_none()
        }) {
            row.ledger_transaction_id = Some(ledger_transaction_id);
        }
        Ok(())
    }
}
