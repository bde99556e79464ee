//! Repository for the earning ledger.
//!
//! Every status change is a conditional update guarded by the expected
//! current status, so concurrent actors (sweep, payout creation, refund
//! approval) race safely: whichever update lands first wins and the loser
//! observes a stale precondition instead of corrupting state.

use crate::error::RepositoryError;
use crate::models::{Earning, EarningStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const EARNING_COLUMNS: &str = r#"id, instructor_id, sale_id, product_id, product_kind,
       sale_price, gateway_fee_amount, platform_commission_rate,
       platform_commission_amount, instructor_earning,
       status, earned_at, available_at, paid_at, refunded_at,
       payment_id, refund_id, fiscal, created_at"#;

pub struct EarningRepository {
    pool: PgPool,
}

impl EarningRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new earning. Exactly one earning may exist per
    /// (sale, product); a concurrent or repeated insert for the same pair
    /// returns `None` and must be treated as an idempotent no-op.
    pub async fn create(&self, earning: &Earning) -> Result<Option<Earning>, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO earnings
            (id, instructor_id, sale_id, product_id, product_kind,
             sale_price, gateway_fee_amount, platform_commission_rate,
             platform_commission_amount, instructor_earning,
             status, earned_at, available_at, fiscal)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (sale_id, product_id) DO NOTHING
            RETURNING {}
            "#,
            EARNING_COLUMNS
        );

        let created = sqlx::query_as::<_, Earning>(&sql)
            .bind(earning.id)
            .bind(earning.instructor_id)
            .bind(earning.sale_id)
            .bind(earning.product_id)
            .bind(&earning.product_kind)
            .bind(earning.sale_price)
            .bind(earning.gateway_fee_amount)
            .bind(earning.platform_commission_rate)
            .bind(earning.platform_commission_amount)
            .bind(earning.instructor_earning)
            .bind(&earning.status)
            .bind(earning.earned_at)
            .bind(earning.available_at)
            .bind(&earning.fiscal)
            .fetch_optional(&self.pool)
            .await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Earning>, RepositoryError> {
        let sql = format!("SELECT {} FROM earnings WHERE id = $1", EARNING_COLUMNS);
        let earning = sqlx::query_as::<_, Earning>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(earning)
    }

    pub async fn find_by_sale_and_product(
        &self,
        sale_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Earning>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM earnings WHERE sale_id = $1 AND product_id = $2",
            EARNING_COLUMNS
        );
        let earning = sqlx::query_as::<_, Earning>(&sql)
            .bind(sale_id)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(earning)
    }

    /// List an instructor's earnings, newest first, optionally filtered by
    /// status.
    pub async fn find_by_instructor(
        &self,
        instructor_id: Uuid,
        status: Option<EarningStatus>,
    ) -> Result<Vec<Earning>, RepositoryError> {
        let earnings = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM earnings WHERE instructor_id = $1 AND status = $2 ORDER BY earned_at DESC",
                    EARNING_COLUMNS
                );
                sqlx::query_as::<_, Earning>(&sql)
                    .bind(instructor_id)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM earnings WHERE instructor_id = $1 ORDER BY earned_at DESC",
                    EARNING_COLUMNS
                );
                sqlx::query_as::<_, Earning>(&sql)
                    .bind(instructor_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(earnings)
    }

    /// Per-status count and sum of instructor shares, for listing totals.
    pub async fn totals_by_status(
        &self,
        instructor_id: Uuid,
    ) -> Result<Vec<(String, i64, Decimal)>, RepositoryError> {
        let totals = sqlx::query_as::<_, (String, i64, Decimal)>(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(instructor_earning), 0)
            FROM earnings
            WHERE instructor_id = $1
            GROUP BY status
            "#,
        )
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }

    /// Load the subset of the requested earnings that is actually eligible
    /// for a payout: owned by the instructor and currently available.
    pub async fn find_available_for_payout(
        &self,
        instructor_id: Uuid,
        earning_ids: &[Uuid],
    ) -> Result<Vec<Earning>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM earnings WHERE id = ANY($1) AND instructor_id = $2 AND status = $3",
            EARNING_COLUMNS
        );
        let earnings = sqlx::query_as::<_, Earning>(&sql)
            .bind(earning_ids)
            .bind(instructor_id)
            .bind(EarningStatus::Available.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(earnings)
    }

    /// Promote every pending earning whose grace period has elapsed.
    /// Re-running finds nothing to update, so the sweep is idempotent.
    pub async fn mark_available_due(&self, now: NaiveDateTime) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE earnings
            SET status = $1
            WHERE status = $2 AND available_at <= $3
            "#,
        )
        .bind(EarningStatus::Available.as_str())
        .bind(EarningStatus::Pending.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Claim a set of available earnings into a payout batch, inside the
    /// batch-creation transaction. Returns how many rows the conditional
    /// update actually claimed; the caller aborts on a mismatch.
    pub async fn claim_for_payment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        instructor_id: Uuid,
        earning_ids: &[Uuid],
        payment_id: Uuid,
        paid_at: NaiveDateTime,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE earnings
            SET status = $1, payment_id = $2, paid_at = $3
            WHERE id = ANY($4) AND instructor_id = $5 AND status = $6
            "#,
        )
        .bind(EarningStatus::Paid.as_str())
        .bind(payment_id)
        .bind(paid_at)
        .bind(earning_ids)
        .bind(instructor_id)
        .bind(EarningStatus::Available.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Divert an unsettled earning to refunded, inside the refund-approval
    /// transaction. Settled earnings never match the guard.
    pub async fn mark_refunded(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        earning_id: Uuid,
        refund_id: Uuid,
        refunded_at: NaiveDateTime,
    ) -> Result<Option<Earning>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE earnings
            SET status = $1, refund_id = $2, refunded_at = $3
            WHERE id = $4 AND status = ANY($5)
            RETURNING {}
            "#,
            EARNING_COLUMNS
        );

        let refundable: Vec<&str> = vec![
            EarningStatus::Pending.as_str(),
            EarningStatus::Available.as_str(),
            EarningStatus::Disputed.as_str(),
            EarningStatus::Blocked.as_str(),
        ];

        let earning = sqlx::query_as::<_, Earning>(&sql)
            .bind(EarningStatus::Refunded.as_str())
            .bind(refund_id)
            .bind(refunded_at)
            .bind(earning_id)
            .bind(refundable)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(earning)
    }

    /// Place an administrative hold (disputed or blocked) on an unsettled
    /// earning. Held earnings are excluded from the sweep and from payouts.
    pub async fn set_hold(
        &self,
        earning_id: Uuid,
        hold: EarningStatus,
    ) -> Result<Option<Earning>, RepositoryError> {
        if !matches!(hold, EarningStatus::Disputed | EarningStatus::Blocked) {
            return Err(RepositoryError::InvalidInput(format!(
                "{} is not an administrative hold",
                hold.as_str()
            )));
        }

        let sql = format!(
            r#"
            UPDATE earnings
            SET status = $1
            WHERE id = $2 AND status = ANY($3)
            RETURNING {}
            "#,
            EARNING_COLUMNS
        );

        let holdable: Vec<&str> = vec![
            EarningStatus::Pending.as_str(),
            EarningStatus::Available.as_str(),
        ];

        let earning = sqlx::query_as::<_, Earning>(&sql)
            .bind(hold.as_str())
            .bind(earning_id)
            .bind(holdable)
            .fetch_optional(&self.pool)
            .await?;

        Ok(earning)
    }

    /// Release a held earning back into the payable flow.
    pub async fn release_hold(&self, earning_id: Uuid) -> Result<Option<Earning>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE earnings
            SET status = $1
            WHERE id = $2 AND status = ANY($3)
            RETURNING {}
            "#,
            EARNING_COLUMNS
        );

        let held: Vec<&str> = vec![
            EarningStatus::Disputed.as_str(),
            EarningStatus::Blocked.as_str(),
        ];

        let earning = sqlx::query_as::<_, Earning>(&sql)
            .bind(EarningStatus::Available.as_str())
            .bind(earning_id)
            .bind(held)
            .fetch_optional(&self.pool)
            .await?;

        Ok(earning)
    }
}
