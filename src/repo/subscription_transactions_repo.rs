use crate::gateways::{GatewayTransaction, TransactionStatus};
use crate::repo::{SubscriptionTransactionRow, SubscriptionTransactionsStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgSubscriptionTransactionsRepo {
    pub pool: PgPool,
}

fn decode(row: &PgRow) -> Result<SubscriptionTransactionRow> {
    let data: serde_json::Value = row.get("paymill_transaction_data");
    let data: GatewayTransaction = serde_json::from_value(data)?;

    Ok(SubscriptionTransactionRow {
        paymill_transaction_id: row.get("paymill_transaction_id"),
        paymill_subscription_id: row.get("paymill_subscription_id"),
        data,
        transaction_date: row.get("paymill_transaction_date"),
        global_process_id: row.get("global_process_id"),
        ledger_transaction_id: row.get("ledger_transaction_id"),
    })
}

#[async_trait::async_trait]
impl SubscriptionTransactionsStore for PgSubscriptionTransactionsRepo {
    async fn unprocessed(
        &self,
        subscription_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<SubscriptionTransactionRow>> {
        let rows = sqlx::query(
            r#"
            SELECT paymill_transaction_id, paymill_subscription_id, paymill_transaction_data,
                   paymill_transaction_date, global_process_id, ledger_transaction_id
            FROM paymill_subscription_transactions
            WHERE paymill_subscription_id = $1
              AND ledger_transaction_id IS NULL
              AND paymill_transaction_data->>'status' = $2
            ORDER BY paymill_transaction_date
            "#,
        )
        .bind(subscription_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode).collect()
    }

    async fn latest_transaction_date(
        &self,
        subscription_id: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let date = sqlx::query_scalar(
            r#"
            SELECT MAX(paymill_transaction_date)
            FROM paymill_subscription_transactions
            WHERE paymill_subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(date)
    }

    async fn insert_if_absent(&self, row: &SubscriptionTransactionRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO paymill_subscription_transactions (
                paymill_transaction_id, paymill_subscription_id, paymill_transaction_data,
                paymill_transaction_date, global_process_id, ledger_transaction_id
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (paymill_transaction_id, paymill_transaction_date) DO NOTHING
            "#,
        )
        .bind(&row.paymill_transaction_id)
        .bind(&row.paymill_subscription_id)
        .bind(serde_json::to_value(&row.data)?)
        .bind(row.transaction_date)
        .bind(&row.global_process_id)
        .bind(row.ledger_transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn link_ledger_transaction(
        &self,
        paymill_transaction_id: &str,
        transaction_date: DateTime<Utc>,
        ledger_transaction_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE paymill_subscription_transactions
            SET ledger_transaction_id = $3
            WHERE paymill_transaction_id = $1
              AND paymill_transaction_date = $2
              AND ledger_transaction_id IS NULL
            "#,
        )
        .bind(paymill_transaction_id)
        .bind(transaction_date)
        .bind(ledger_transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
