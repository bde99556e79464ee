//! Repository for refund requests.

use crate::error::RepositoryError;
use crate::models::{Refund, RefundStatus};
use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const REFUND_COLUMNS: &str = r#"id, sale_id, product_id, user_id, line_price,
       clawback_amount, refund_amount, payment_method, status, reason,
       admin_notes, requested_by, reviewed_by, earning_id,
       created_at, reviewed_at"#;

pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, refund: &Refund) -> Result<Refund, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO refunds
            (id, sale_id, product_id, user_id, line_price, clawback_amount,
             refund_amount, payment_method, status, reason, requested_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            REFUND_COLUMNS
        );

        let created = sqlx::query_as::<_, Refund>(&sql)
            .bind(refund.id)
            .bind(refund.sale_id)
            .bind(refund.product_id)
            .bind(refund.user_id)
            .bind(refund.line_price)
            .bind(refund.clawback_amount)
            .bind(refund.refund_amount)
            .bind(&refund.payment_method)
            .bind(&refund.status)
            .bind(&refund.reason)
            .bind(refund.requested_by)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Refund>, RepositoryError> {
        let sql = format!("SELECT {} FROM refunds WHERE id = $1", REFUND_COLUMNS);
        let refund = sqlx::query_as::<_, Refund>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(refund)
    }

    /// An open (pending or completed) refund for the same line item blocks a
    /// second request.
    pub async fn find_open_for_line(
        &self,
        sale_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Refund>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM refunds WHERE sale_id = $1 AND product_id = $2 AND status = ANY($3)",
            REFUND_COLUMNS
        );

        let open: Vec<&str> = vec![
            RefundStatus::Pending.as_str(),
            RefundStatus::Approved.as_str(),
            RefundStatus::Processing.as_str(),
            RefundStatus::Completed.as_str(),
        ];

        let refund = sqlx::query_as::<_, Refund>(&sql)
            .bind(sale_id)
            .bind(product_id)
            .bind(open)
            .fetch_optional(&self.pool)
            .await?;

        Ok(refund)
    }

    /// Stamp a rejection. Only a pending refund can be rejected.
    pub async fn mark_rejected(
        &self,
        id: Uuid,
        admin_id: Uuid,
        admin_notes: Option<&str>,
        reviewed_at: NaiveDateTime,
    ) -> Result<Option<Refund>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE refunds
            SET status = $2, reviewed_by = $3, admin_notes = $4, reviewed_at = $5
            WHERE id = $1 AND status = $6
            RETURNING {}
            "#,
            REFUND_COLUMNS
        );

        let refund = sqlx::query_as::<_, Refund>(&sql)
            .bind(id)
            .bind(RefundStatus::Rejected.as_str())
            .bind(admin_id)
            .bind(admin_notes)
            .bind(reviewed_at)
            .bind(RefundStatus::Pending.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(refund)
    }

    /// Complete an approved refund within the approval transaction, linking
    /// the reversed earning. Guarded on pending status so a concurrent
    /// review loses cleanly.
    pub async fn complete_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        admin_id: Uuid,
        admin_notes: Option<&str>,
        earning_id: Uuid,
        reviewed_at: NaiveDateTime,
    ) -> Result<Option<Refund>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE refunds
            SET status = $2, reviewed_by = $3, admin_notes = $4, earning_id = $5, reviewed_at = $6
            WHERE id = $1 AND status = $7
            RETURNING {}
            "#,
            REFUND_COLUMNS
        );

        let refund = sqlx::query_as::<_, Refund>(&sql)
            .bind(id)
            .bind(RefundStatus::Completed.as_str())
            .bind(admin_id)
            .bind(admin_notes)
            .bind(earning_id)
            .bind(reviewed_at)
            .bind(RefundStatus::Pending.as_str())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(refund)
    }
}
