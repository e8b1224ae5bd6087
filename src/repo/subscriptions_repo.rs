use crate::domain::order::Customer;
use crate::repo::{SubscriptionRow, SubscriptionSearch, SubscriptionsStore};
use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct PgSubscriptionsRepo {
    pub pool: PgPool,
}

fn decode(row: &PgRow) -> Result<SubscriptionRow> {
    let customer: serde_json::Value = row.get("customer");
    let customer: Customer = serde_json::from_value(customer)?;

    Ok(SubscriptionRow {
        paymill_subscription_id: row.get("paymill_subscription_id"),
        paymill_offer_id: row.get("paymill_offer_id"),
        paymill_payment_id: row.get("paymill_payment_id"),
        customer,
        global_process_id: row.get("global_process_id"),
        active: row.get("active"),
    })
}

/// Sortable columns for the listing grid; anything else falls back to the
/// insertion timestamp.
fn sort_column(requested: Option<&str>) -> &'static str {
    match requested {
        Some("paymill_subscription_id") => "paymill_subscription_id",
        Some("paymill_offer_id") => "paymill_offer_id",
        Some("global_process_id") => "global_process_id",
        Some("active") => "active",
        _ => "created_at",
    }
}

#[async_trait::async_trait]
impl SubscriptionsStore for PgSubscriptionsRepo {
    async fn insert(&self, row: &SubscriptionRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO paymill_subscriptions (
                paymill_subscription_id, paymill_offer_id, paymill_payment_id,
                customer, global_process_id, active
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (paymill_subscription_id) DO NOTHING
            "#,
        )
        .bind(&row.paymill_subscription_id)
        .bind(&row.paymill_offer_id)
        .bind(&row.paymill_payment_id)
        .bind(serde_json::to_value(&row.customer)?)
        .bind(&row.global_process_id)
        .bind(row.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, subscription_id: &str) -> Result<Option<SubscriptionRow>> {
        let row = sqlx::query(
            r#"
            SELECT paymill_subscription_id, paymill_offer_id, paymill_payment_id,
                   customer, global_process_id, active
            FROM paymill_subscriptions
            WHERE paymill_subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode(&r)).transpose()
    }

    async fn set_active(&self, subscription_id: &str, active: bool) -> Result<()> {
        sqlx::query(
            "UPDATE paymill_subscriptions SET active = $2 WHERE paymill_subscription_id = $1",
        )
        .bind(subscription_id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, search: &SubscriptionSearch) -> Result<(Vec<SubscriptionRow>, i64)> {
        let pattern = search.search.as_ref().map(|s| format!("%{s}%"));
        let order = format!(
            "{} {}",
            sort_column(search.sort_on.as_deref()),
            if search.sort_desc { "DESC" } else { "ASC" }
        );

        let sql = format!(
            r#"
            SELECT paymill_subscription_id, paymill_offer_id, paymill_payment_id,
                   customer, global_process_id, active
            FROM paymill_subscriptions
            WHERE ($1::text IS NULL OR global_process_id LIKE $1)
            ORDER BY {order}
            LIMIT $2 OFFSET $3
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(search.limit)
            .bind(search.offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM paymill_subscriptions
            WHERE ($1::text IS NULL OR global_process_id LIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows: Result<Vec<_>> = rows.iter().map(decode).collect();
        Ok((rows?, total))
    }

    async fn ids(&self, include_inactive: bool) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT paymill_subscription_id
            FROM paymill_subscriptions
            WHERE active OR $1
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("paymill_subscription_id")).collect())
    }

    async fn by_global_process_ids(&self, ids: &[String]) -> Result<Vec<SubscriptionRow>> {
        let rows = sqlx::query(
            r#"
            SELECT paymill_subscription_id, paymill_offer_id, paymill_payment_id,
                   customer, global_process_id, active
            FROM paymill_subscriptions
            WHERE global_process_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode).collect()
    }
}
