use crate::commission::{self, FeeSchedule};
use crate::error::{reason, AppError, AppResult};
use crate::models::{Earning, EarningStatus};
use crate::repositories::{
    CommissionSettingsRepository, EarningRepository, ProductRepository, SaleRepository,
};
use crate::services::collaborators::CouponGateway;
use crate::services::fiscal::{FiscalAuditService, WithholdingPolicy};
use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of one earning-creation pass over a sale.
#[derive(Debug, Clone, Default)]
pub struct EarningCreationSummary {
    pub created: Vec<Uuid>,
    pub skipped: usize,
}

/// Service that turns paid sales into earning ledger entries.
pub struct EarningService {
    sale_repo: Arc<SaleRepository>,
    product_repo: Arc<ProductRepository>,
    earning_repo: Arc<EarningRepository>,
    settings_repo: Arc<CommissionSettingsRepository>,
    coupon_gateway: Arc<dyn CouponGateway>,
    withholding: Arc<dyn WithholdingPolicy>,
    fiscal_audit: Option<Arc<FiscalAuditService>>,
}

impl EarningService {
    pub fn new(
        sale_repo: Arc<SaleRepository>,
        product_repo: Arc<ProductRepository>,
        earning_repo: Arc<EarningRepository>,
        settings_repo: Arc<CommissionSettingsRepository>,
        coupon_gateway: Arc<dyn CouponGateway>,
        withholding: Arc<dyn WithholdingPolicy>,
        fiscal_audit: Option<Arc<FiscalAuditService>>,
    ) -> Self {
        Self {
            sale_repo,
            product_repo,
            earning_repo,
            settings_repo,
            coupon_gateway,
            withholding,
            fiscal_audit,
        }
    }

    /// Create one earning per line item of a paid sale.
    ///
    /// Idempotent: the unique (sale, product) index makes a concurrent or
    /// repeated pass a logged no-op per line item, so gateway redeliveries
    /// and backfill runs are safe.
    pub async fn record_sale_paid(&self, sale_id: Uuid) -> AppResult<EarningCreationSummary> {
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

        let method = sale
            .payment_method_enum()
            .map_err(AppError::Validation)?;
        let schedule = FeeSchedule::for_method(method);

        let settings = self.settings_repo.get_or_create().await?;
        let today = chrono::Utc::now().date_naive();
        let grace_days = settings.days_until_available;

        let mut summary = EarningCreationSummary::default();

        // Line items settle independently; one bad item must not block the
        // others.
        for item in sale.items_vec() {
            if item.unit_price <= Decimal::ZERO {
                info!(
                    "Skipping zero-value line item {} on sale {}",
                    item.product_id, sale_id
                );
                summary.skipped += 1;
                continue;
            }

            let instructor_id = match self
                .product_repo
                .find_owner(item.product_id, item.product_kind)
                .await?
            {
                Some(owner) => owner,
                None => {
                    error!(
                        "No {} {} found while settling sale {}; line item skipped",
                        item.product_kind.as_str(),
                        item.product_id,
                        sale_id
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            // Idempotency check before doing any work for this line item
            if let Some(existing) = self
                .earning_repo
                .find_by_sale_and_product(sale_id, item.product_id)
                .await?
            {
                info!(
                    "Earning {} already exists for sale {} product {}; skipping",
                    existing.id, sale_id, item.product_id
                );
                summary.skipped += 1;
                continue;
            }

            let referral_validated = match &item.referral_code {
                Some(code) => {
                    self.coupon_gateway
                        .validate_referral(code, instructor_id, item.product_id)
                        .await
                }
                None => false,
            };

            let rate = commission::select_rate(
                settings.rate_for(instructor_id, today),
                settings.default_commission_rate,
                settings.referral_commission_rate,
                referral_validated,
            );

            let split = commission::split(item.unit_price, schedule, rate)
                .map_err(|e| AppError::Validation(e.to_string()))?;
            if split.is_noop() {
                summary.skipped += 1;
                continue;
            }

            let now = chrono::Utc::now().naive_utc();
            let available_at = now + Duration::days(grace_days as i64);
            // A zero-day grace period yields immediate availability
            let status = if grace_days == 0 {
                EarningStatus::Available
            } else {
                EarningStatus::Pending
            };

            let fiscal = self.withholding.breakdown(split.instructor_share);

            let earning = Earning {
                id: Uuid::new_v4(),
                instructor_id,
                sale_id,
                product_id: item.product_id,
                product_kind: item.product_kind.as_str().to_string(),
                sale_price: split.gross,
                gateway_fee_amount: split.gateway_fee,
                platform_commission_rate: split.commission_rate,
                platform_commission_amount: split.platform_share,
                instructor_earning: split.instructor_share,
                status: status.as_str().to_string(),
                earned_at: now,
                available_at,
                paid_at: None,
                refunded_at: None,
                payment_id: None,
                refund_id: None,
                fiscal: serde_json::to_value(&fiscal).ok(),
                created_at: now,
            };

            match self.earning_repo.create(&earning).await? {
                Some(created) => {
                    info!(
                        "Earning {} recorded: instructor {} earns {} from sale {} ({})",
                        created.id,
                        instructor_id,
                        created.instructor_earning,
                        sale_id,
                        created.status
                    );

                    // Reporting side channel: never fatal to settlement
                    if let Some(audit) = &self.fiscal_audit {
                        if let Err(e) = audit.log_earning_recorded(&created).await {
                            warn!("Fiscal audit write failed for earning {}: {}", created.id, e);
                        }
                    }

                    summary.created.push(created.id);
                }
                None => {
                    // A concurrent pass inserted the same (sale, product) first
                    info!(
                        "Earning for sale {} product {} created concurrently; skipping",
                        sale_id, item.product_id
                    );
                    summary.skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Backfill entry point: re-runs the creation pass for a sale. Safe to
    /// invoke any number of times.
    pub async fn reconcile_sale(&self, sale_id: Uuid) -> AppResult<EarningCreationSummary> {
        self.record_sale_paid(sale_id).await
    }

    /// Instructor earnings listing with per-status totals.
    pub async fn list_for_instructor(
        &self,
        instructor_id: Uuid,
        status: Option<EarningStatus>,
    ) -> AppResult<(Vec<Earning>, Vec<(String, i64, Decimal)>)> {
        let earnings = self
            .earning_repo
            .find_by_instructor(instructor_id, status)
            .await?;
        let totals = self.earning_repo.totals_by_status(instructor_id).await?;

        Ok((earnings, totals))
    }

    /// Place an administrative hold on an unsettled earning.
    pub async fn set_hold(&self, earning_id: Uuid, hold: EarningStatus) -> AppResult<Earning> {
        self.earning_repo
            .set_hold(earning_id, hold)
            .await?
            .ok_or_else(|| {
                AppError::not_eligible(
                    reason::INVALID_STATUS_TRANSITION,
                    format!("Earning {} is not in a holdable status", earning_id),
                )
            })
    }

    /// Release a held earning back into the payable flow.
    pub async fn release_hold(&self, earning_id: Uuid) -> AppResult<Earning> {
        self.earning_repo
            .release_hold(earning_id)
            .await?
            .ok_or_else(|| {
                AppError::not_eligible(
                    reason::INVALID_STATUS_TRANSITION,
                    format!("Earning {} is not held", earning_id),
                )
            })
    }
}
