//! Repository for sales. The paid transition is the exactly-once trigger
//! for downstream earning creation.

use crate::error::RepositoryError;
use crate::models::{Sale, SaleStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub struct SaleRepository {
    pool: PgPool,
}

impl SaleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, sale: &Sale) -> Result<Sale, RepositoryError> {
        let created = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (id, user_id, payment_method, status, items)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, payment_method, status, items, created_at, paid_at
            "#,
        )
        .bind(sale.id)
        .bind(&sale.user_id)
        .bind(&sale.payment_method)
        .bind(&sale.status)
        .bind(&sale.items)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Sale>, RepositoryError> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, user_id, payment_method, status, items, created_at, paid_at
            FROM sales
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Flip a pending sale to paid. Returns the sale only when this call won
    /// the transition; a redelivered gateway notification gets `None` and
    /// must not retrigger downstream processing.
    pub async fn mark_paid(&self, id: Uuid) -> Result<Option<Sale>, RepositoryError> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales
            SET status = $2, paid_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING id, user_id, payment_method, status, items, created_at, paid_at
            "#,
        )
        .bind(id)
        .bind(SaleStatus::Paid.as_str())
        .bind(SaleStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Cancel a pending sale. Paid sales never reverse.
    pub async fn cancel(&self, id: Uuid) -> Result<Option<Sale>, RepositoryError> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales
            SET status = $2
            WHERE id = $1 AND status = $3
            RETURNING id, user_id, payment_method, status, items, created_at, paid_at
            "#,
        )
        .bind(id)
        .bind(SaleStatus::Cancelled.as_str())
        .bind(SaleStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }
}
