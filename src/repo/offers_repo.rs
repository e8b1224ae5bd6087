use crate::repo::{OfferRow, OffersStore};
use anyhow::Result;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct PgOffersRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl OffersStore for PgOffersRepo {
    async fn find_by_hash(&self, identification_hash: &str) -> Result<Option<OfferRow>> {
        let row = sqlx::query(
            r#"
            SELECT paymill_id, identification_hash, created_at
            FROM paymill_offers
            WHERE identification_hash = $1
            "#,
        )
        .bind(identification_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| OfferRow {
            paymill_id: r.get("paymill_id"),
            identification_hash: r.get("identification_hash"),
            created_at: r.get("created_at"),
        }))
    }

    async fn insert(&self, paymill_id: &str, identification_hash: &str) -> Result<OfferRow> {
        // The no-op DO UPDATE makes RETURNING yield the surviving row, so a
        // concurrent insert loses the race cleanly instead of duplicating.
        let row = sqlx::query(
            r#"
            INSERT INTO paymill_offers (paymill_id, identification_hash)
            VALUES ($1, $2)
            ON CONFLICT (identification_hash)
            DO UPDATE SET identification_hash = EXCLUDED.identification_hash
            RETURNING paymill_id, identification_hash, created_at
            "#,
        )
        .bind(paymill_id)
        .bind(identification_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(OfferRow {
            paymill_id: row.get("paymill_id"),
            identification_hash: row.get("identification_hash"),
            created_at: row.get("created_at"),
        })
    }
}
