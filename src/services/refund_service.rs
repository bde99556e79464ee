use crate::commission::{self, FeeSchedule};
use crate::error::{reason, AppError, AppResult};
use crate::models::{EarningStatus, ProductKind, Refund, RefundStatus};
use crate::repositories::{EarningRepository, RefundRepository, SaleRepository, WalletRepository};
use crate::services::collaborators::EnrollmentGateway;
use crate::services::fiscal::FiscalAuditService;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Service that reconciles approved refunds against the earning ledger and
/// the buyer's wallet.
pub struct RefundService {
    pool: PgPool,
    refund_repo: Arc<RefundRepository>,
    earning_repo: Arc<EarningRepository>,
    wallet_repo: Arc<WalletRepository>,
    sale_repo: Arc<SaleRepository>,
    enrollment_gateway: Arc<dyn EnrollmentGateway>,
    fiscal_audit: Option<Arc<FiscalAuditService>>,
}

impl RefundService {
    pub fn new(
        pool: PgPool,
        refund_repo: Arc<RefundRepository>,
        earning_repo: Arc<EarningRepository>,
        wallet_repo: Arc<WalletRepository>,
        sale_repo: Arc<SaleRepository>,
        enrollment_gateway: Arc<dyn EnrollmentGateway>,
        fiscal_audit: Option<Arc<FiscalAuditService>>,
    ) -> Self {
        Self {
            pool,
            refund_repo,
            earning_repo,
            wallet_repo,
            sale_repo,
            enrollment_gateway,
            fiscal_audit,
        }
    }

    /// Record a refund request for one line item of a paid sale.
    ///
    /// The credited amount is the paid line price minus the gateway-fee
    /// claw-back; a wallet-settled sale incurred no gateway fee, so nothing
    /// is clawed back.
    pub async fn request_refund(
        &self,
        sale_id: Uuid,
        product_id: Uuid,
        requested_by: Uuid,
        reason_text: Option<String>,
    ) -> AppResult<Refund> {
        let sale = self
            .sale_repo
            .find_by_id(sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Sale {} not found", sale_id)))?;

        if !sale.is_paid() {
            return Err(AppError::not_eligible(
                reason::SALE_NOT_PAID,
                format!("Sale {} is {}, not paid", sale_id, sale.status),
            ));
        }

        let item = sale
            .items_vec()
            .into_iter()
            .find(|item| item.product_id == product_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Sale {} has no line item for product {}",
                    sale_id, product_id
                ))
            })?;

        if let Some(open) = self.refund_repo.find_open_for_line(sale_id, product_id).await? {
            return Err(AppError::BusinessLogic(format!(
                "Refund {} already covers sale {} product {}",
                open.id, sale_id, product_id
            )));
        }

        let method = sale.payment_method_enum().map_err(AppError::Validation)?;
        let schedule = FeeSchedule::for_method(method);

        let line_price = commission::round2(item.unit_price);
        let clawback = commission::refund_clawback(line_price, schedule);
        let refund_amount = line_price - clawback;

        let refund = Refund {
            id: Uuid::new_v4(),
            sale_id,
            product_id,
            user_id: sale.user_id,
            line_price,
            clawback_amount: clawback,
            refund_amount,
            payment_method: sale.payment_method.clone(),
            status: RefundStatus::Pending.as_str().to_string(),
            reason: reason_text,
            admin_notes: None,
            requested_by,
            reviewed_by: None,
            earning_id: None,
            created_at: chrono::Utc::now().naive_utc(),
            reviewed_at: None,
        };

        refund.validate().map_err(AppError::Validation)?;

        let created = self.refund_repo.create(&refund).await?;

        info!(
            "Refund {} requested: sale {} product {}, credit {} (claw-back {})",
            created.id, sale_id, product_id, created.refund_amount, created.clawback_amount
        );

        Ok(created)
    }

    /// Review a pending refund.
    ///
    /// Rejection stamps the decision. Approval reverses the earning,
    /// completes the refund, and credits the buyer's wallet in a single
    /// database transaction; if any step fails everything rolls back, so a
    /// refunded earning can never exist without its compensating credit.
    pub async fn review_refund(
        &self,
        refund_id: Uuid,
        approve: bool,
        admin_id: Uuid,
        admin_notes: Option<String>,
    ) -> AppResult<Refund> {
        let refund = self
            .refund_repo
            .find_by_id(refund_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Refund {} not found", refund_id)))?;

        let status = refund.status_enum().map_err(AppError::Validation)?;
        if !status.is_reviewable() {
            return Err(AppError::not_eligible(
                reason::REFUND_ALREADY_REVIEWED,
                format!("Refund {} is already {}", refund_id, refund.status),
            ));
        }

        let now = chrono::Utc::now().naive_utc();

        if !approve {
            let rejected = self
                .refund_repo
                .mark_rejected(refund_id, admin_id, admin_notes.as_deref(), now)
                .await?
                .ok_or_else(|| {
                    AppError::not_eligible(
                        reason::REFUND_ALREADY_REVIEWED,
                        format!("Refund {} was reviewed concurrently", refund_id),
                    )
                })?;

            info!("Refund {} rejected by {}", refund_id, admin_id);
            return Ok(rejected);
        }

        let earning = self
            .earning_repo
            .find_by_sale_and_product(refund.sale_id, refund.product_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No earning found for sale {} product {}",
                    refund.sale_id, refund.product_id
                ))
            })?;

        // Hard business invariant: money already sent out is never clawed back
        if earning.status_enum().map_err(AppError::Validation)?.is_settled() {
            return Err(AppError::not_eligible(
                reason::INSTRUCTOR_ALREADY_PAID,
                format!(
                    "Earning {} was settled in payment batch {:?}",
                    earning.id, earning.payment_id
                ),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(crate::error::RepositoryError::from)?;

        let reversed = self
            .earning_repo
            .mark_refunded(&mut tx, earning.id, refund.id, now)
            .await?;

        let reversed = match reversed {
            Some(earning) => earning,
            None => {
                // Lost the race: the status changed after the guard above
                drop(tx);
                let fresh = self.earning_repo.find_by_id(earning.id).await?;
                let code = match fresh.and_then(|e| e.status_enum().ok()) {
                    Some(EarningStatus::Paid) => reason::INSTRUCTOR_ALREADY_PAID,
                    _ => reason::INVALID_STATUS_TRANSITION,
                };
                return Err(AppError::not_eligible(
                    code,
                    format!("Earning {} is no longer refundable", earning.id),
                ));
            }
        };

        // Credit the buyer; a zero credit (claw-back consumed the whole
        // line) appends nothing
        if refund.refund_amount > rust_decimal::Decimal::ZERO {
            let metadata = serde_json::json!({
                "refund_id": refund.id,
                "sale_id": refund.sale_id,
                "product_id": refund.product_id,
            });

            self.wallet_repo
                .credit_in_tx(
                    &mut tx,
                    refund.user_id,
                    refund.refund_amount,
                    Some("Refund credit"),
                    Some(metadata),
                )
                .await?;
        }

        let completed = self
            .refund_repo
            .complete_in_tx(&mut tx, refund_id, admin_id, admin_notes.as_deref(), reversed.id, now)
            .await?
            .ok_or_else(|| {
                AppError::not_eligible(
                    reason::REFUND_ALREADY_REVIEWED,
                    format!("Refund {} was reviewed concurrently", refund_id),
                )
            })?;

        tx.commit().await.map_err(crate::error::RepositoryError::from)?;

        info!(
            "Refund {} approved by {}: earning {} reversed, {} credited to user {}",
            refund_id, admin_id, reversed.id, completed.refund_amount, completed.user_id
        );

        if let Some(audit) = &self.fiscal_audit {
            if let Err(e) = audit.log_earning_refunded(&reversed, refund_id).await {
                warn!("Fiscal audit write failed for refund {}: {}", refund_id, e);
            }
        }

        // Access revocation is an external side effect; a failure here is
        // logged for follow-up, the refund itself already committed
        let kind = ProductKind::from_str(&reversed.product_kind)
            .unwrap_or(ProductKind::Course);
        if let Err(e) = self
            .enrollment_gateway
            .revoke_access(completed.user_id, completed.product_id, kind)
            .await
        {
            warn!(
                "Access revocation failed for user {} product {}: {}",
                completed.user_id, completed.product_id, e
            );
        }

        Ok(completed)
    }

    pub async fn get(&self, refund_id: Uuid) -> AppResult<Refund> {
        self.refund_repo
            .find_by_id(refund_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Refund {} not found", refund_id)))
    }
}
