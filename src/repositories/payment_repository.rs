//! Repository for payout batches.

use crate::error::RepositoryError;
use crate::models::{apply_transition, Payment, PaymentStatus, StatusHistoryEntry};
use crate::repositories::EarningRepository;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = r#"id, instructor_id, earning_ids, total_earnings,
       platform_deductions, final_amount, payment_method, currency,
       status, status_history, notes, created_by, processed_by,
       created_at, completed_at"#;

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the payout batch and claim its earnings in one transaction.
    ///
    /// The claim is a conditional update (`status = 'available'`); if a
    /// concurrent payout or refund got to any earning first, the claimed
    /// count comes up short and the whole transaction rolls back.
    pub async fn create_with_earnings(
        &self,
        payment: &Payment,
        earning_repo: &EarningRepository,
        earning_ids: &[Uuid],
        paid_at: NaiveDateTime,
    ) -> Result<Payment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO payments
            (id, instructor_id, earning_ids, total_earnings, platform_deductions,
             final_amount, payment_method, currency, status, status_history,
             notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let created = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.id)
            .bind(payment.instructor_id)
            .bind(&payment.earning_ids)
            .bind(payment.total_earnings)
            .bind(payment.platform_deductions)
            .bind(payment.final_amount)
            .bind(&payment.payment_method)
            .bind(&payment.currency)
            .bind(&payment.status)
            .bind(&payment.status_history)
            .bind(&payment.notes)
            .bind(payment.created_by)
            .fetch_one(&mut *tx)
            .await?;

        let claimed = earning_repo
            .claim_for_payment(&mut tx, payment.instructor_id, earning_ids, payment.id, paid_at)
            .await?;

        if claimed != earning_ids.len() as u64 {
            // Dropping the transaction rolls everything back
            return Err(RepositoryError::BusinessRule(format!(
                "Only {} of {} earnings could be claimed",
                claimed,
                earning_ids.len()
            )));
        }

        tx.commit().await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, RepositoryError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_instructor(
        &self,
        instructor_id: Uuid,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE instructor_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(instructor_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    /// Advance the batch lifecycle, appending the transition to the
    /// status history. Rejects transitions the state machine forbids.
    pub async fn transition_status(
        &self,
        id: Uuid,
        next: PaymentStatus,
        actor: Uuid,
        notes: Option<String>,
    ) -> Result<Payment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM payments WHERE id = $1 FOR UPDATE", PAYMENT_COLUMNS);
        let current = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Payment {} not found", id)))?;

        let current_status = current
            .status_enum()
            .map_err(RepositoryError::InvalidInput)?;

        let now = chrono::Utc::now().naive_utc();
        let entry = apply_transition(current_status, next, actor, notes, now).map_err(
            |(from, to)| {
                RepositoryError::BusinessRule(format!(
                    "Payment cannot move from {} to {}",
                    from.as_str(),
                    to.as_str()
                ))
            },
        )?;

        let mut history: Vec<StatusHistoryEntry> = current.status_history_vec();
        history.push(entry);
        let history_json =
            serde_json::to_value(&history).map_err(|e| RepositoryError::InvalidInput(e.to_string()))?;

        let completed_at = if next == PaymentStatus::Completed {
            Some(now)
        } else {
            current.completed_at
        };

        let sql = format!(
            r#"
            UPDATE payments
            SET status = $2, status_history = $3, processed_by = $4, completed_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let updated = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .bind(next.as_str())
            .bind(history_json)
            .bind(actor)
            .bind(completed_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(updated)
    }
}
