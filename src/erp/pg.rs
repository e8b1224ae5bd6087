use crate::domain::invoice::Invoice;
use crate::domain::ledger::{LedgerKind, LedgerStatus, LedgerTransaction, NewLedgerTransaction};
use crate::domain::order::Order;
use crate::erp::{InvoiceStore, Ledger, OrderStore};
use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Postgres adapters for the narrow ERP slice this service needs when it runs
/// standalone. A host deployment plugs its own implementations of the
/// `erp::*` traits in instead.
#[derive(Clone)]
pub struct PgOrderStore {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl OrderStore for PgOrderStore {
    async fn get_by_hash(&self, hash: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc FROM orders WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let doc: serde_json::Value = r.get("doc");
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (hash, doc) VALUES ($1, $2)
            ON CONFLICT (hash) DO UPDATE SET doc = $2
            "#,
        )
        .bind(&order.hash)
        .bind(serde_json::to_value(order)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct PgInvoiceStore {
    pub pool: PgPool,
}

impl PgInvoiceStore {
    fn decode(row: &sqlx::postgres::PgRow) -> Result<Invoice> {
        let doc: serde_json::Value = row.get("doc");
        Ok(serde_json::from_value(doc)?)
    }
}

#[async_trait::async_trait]
impl InvoiceStore for PgInvoiceStore {
    async fn get(&self, id: &str) -> Result<Option<Invoice>> {
        let row = sqlx::query("SELECT doc FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::decode(&r)).transpose()
    }

    async fn list_unpaid_by_payment_types(&self, payment_types: &[String]) -> Result<Vec<Invoice>> {
        let rows = sqlx::query(
            "SELECT doc FROM invoices WHERE NOT paid AND payment_type = ANY($1) ORDER BY id",
        )
        .bind(payment_types)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::decode).collect()
    }

    async fn attach_transaction(&self, invoice_id: &str, ledger_transaction_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET doc = jsonb_set(
                doc,
                '{ledger_transaction_ids}',
                COALESCE(doc->'ledger_transaction_ids', '[]'::jsonb) || to_jsonb($2::text)
            )
            WHERE id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(ledger_transaction_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct PgLedger {
    pub pool: PgPool,
}

impl PgLedger {
    async fn insert(&self, kind: LedgerKind, input: NewLedgerTransaction) -> Result<LedgerTransaction> {
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

        sqlx::query(
            r#"
            INSERT INTO ledger_transactions (
                id, kind, amount, currency, hash, global_process_id, status, message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tx.id)
        .bind(tx.kind.as_str())
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(&tx.hash)
        .bind(&tx.global_process_id)
        .bind(tx.status.as_str())
        .bind(&tx.message)
        .execute(&self.pool)
        .await?;

        Ok(tx)
    }
}

#[async_trait::async_trait]
impl Ledger for PgLedger {
    async fn create_payment_transaction(
        &self,
        input: NewLedgerTransaction,
    ) -> Result<LedgerTransaction> {
        self.insert(LedgerKind::Payment, input).await
    }

    async fn create_refund_transaction(
        &self,
        input: NewLedgerTransaction,
    ) -> Result<LedgerTransaction> {
        self.insert(LedgerKind::Refund, input).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<LedgerTransaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, amount, currency, hash, global_process_id, status,
                   gateway_transaction_id, gateway_refund_id, message
            FROM ledger_transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LedgerTransaction {
            id: r.get("id"),
            kind: if r.get::<String, _>("kind") == "REFUND" {
                LedgerKind::Refund
            } else {
                LedgerKind::Payment
            },
            amount: r.get("amount"),
            currency: r.get("currency"),
            hash: r.get("hash"),
            global_process_id: r.get("global_process_id"),
            status: LedgerStatus::parse(&r.get::<String, _>("status")),
            gateway_transaction_id: r.get("gateway_transaction_id"),
            gateway_refund_id: r.get("gateway_refund_id"),
            message: r.get("message"),
        }))
    }

    async fn set_status(&self, id: Uuid, status: LedgerStatus) -> Result<()> {
        sqlx::query("UPDATE ledger_transactions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_gateway_ids(
        &self,
        id: Uuid,
        gateway_transaction_id: Option<&str>,
        gateway_refund_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ledger_transactions
            SET gateway_transaction_id = COALESCE($2, gateway_transaction_id),
                gateway_refund_id = COALESCE($3, gateway_refund_id)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(gateway_transaction_id)
        .bind(gateway_refund_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
