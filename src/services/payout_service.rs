use crate::commission::round2;
use crate::error::{reason, AppError, AppResult, RepositoryError};
use crate::models::{Payment, PaymentStatus, StatusHistoryEntry};
use crate::repositories::{
    CommissionSettingsRepository, EarningRepository, PaymentRepository, UserRepository,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Service that aggregates available earnings into payout batches and
/// advances them through their lifecycle.
pub struct PayoutService {
    payment_repo: Arc<PaymentRepository>,
    earning_repo: Arc<EarningRepository>,
    user_repo: Arc<UserRepository>,
    settings_repo: Arc<CommissionSettingsRepository>,
}

impl PayoutService {
    pub fn new(
        payment_repo: Arc<PaymentRepository>,
        earning_repo: Arc<EarningRepository>,
        user_repo: Arc<UserRepository>,
        settings_repo: Arc<CommissionSettingsRepository>,
    ) -> Self {
        Self {
            payment_repo,
            earning_repo,
            user_repo,
            settings_repo,
        }
    }

    /// Create a payout batch from a set of available earnings.
    ///
    /// Every referenced earning must belong to the instructor and be
    /// available; the batch insert and the earning claims commit in one
    /// transaction, so either all N earnings become paid referencing the
    /// new batch or nothing changes.
    pub async fn create_payment(
        &self,
        instructor_id: Uuid,
        earning_ids: Vec<Uuid>,
        deductions: Option<Decimal>,
        notes: Option<String>,
        admin_id: Uuid,
    ) -> AppResult<Payment> {
        if earning_ids.is_empty() {
            return Err(AppError::Validation(
                "At least one earning must be selected".to_string(),
            ));
        }

        let unique: HashSet<Uuid> = earning_ids.iter().copied().collect();
        if unique.len() != earning_ids.len() {
            return Err(AppError::Validation(
                "Earning selection contains duplicates".to_string(),
            ));
        }

        let deductions = deductions.unwrap_or(Decimal::ZERO);
        if deductions < Decimal::ZERO {
            return Err(AppError::Validation(
                "Deductions must not be negative".to_string(),
            ));
        }

        let instructor = self
            .user_repo
            .find_by_id(instructor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Instructor {} not found", instructor_id)))?;

        // No payout destination, no batch
        let payout_method = match instructor.payout_method.as_deref() {
            Some(method) if !method.trim().is_empty() => method.to_string(),
            _ => {
                return Err(AppError::not_eligible(
                    reason::NO_PAYOUT_METHOD,
                    format!("Instructor {} has no configured payout method", instructor_id),
                ))
            }
        };

        let eligible = self
            .earning_repo
            .find_available_for_payout(instructor_id, &earning_ids)
            .await?;

        if eligible.len() != earning_ids.len() {
            return Err(AppError::not_eligible(
                reason::EARNING_NOT_AVAILABLE,
                format!(
                    "{} of {} selected earnings are not available for payout",
                    earning_ids.len() - eligible.len(),
                    earning_ids.len()
                ),
            ));
        }

        let total_earnings: Decimal = eligible.iter().map(|e| e.instructor_earning).sum();
        let final_amount = round2(total_earnings - deductions).max(Decimal::ZERO);

        let settings = self.settings_repo.get_or_create().await?;
        if final_amount < settings.minimum_payment_threshold {
            return Err(AppError::not_eligible(
                reason::BELOW_MINIMUM_THRESHOLD,
                format!(
                    "Final amount {} is below the minimum payout threshold {}",
                    final_amount, settings.minimum_payment_threshold
                ),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        let initial_history = vec![StatusHistoryEntry {
            status: PaymentStatus::Pending,
            actor: admin_id,
            notes: notes.clone(),
            at: now,
        }];

        let payment = Payment {
            id: Uuid::new_v4(),
            instructor_id,
            earning_ids: serde_json::to_value(&earning_ids)?,
            total_earnings,
            platform_deductions: deductions,
            final_amount,
            payment_method: payout_method,
            currency: "USD".to_string(),
            status: PaymentStatus::Pending.as_str().to_string(),
            status_history: serde_json::to_value(&initial_history)?,
            notes,
            created_by: admin_id,
            processed_by: None,
            created_at: now,
            completed_at: None,
        };

        let created = self
            .payment_repo
            .create_with_earnings(&payment, &self.earning_repo, &earning_ids, now)
            .await
            .map_err(|e| match e {
                // An earning was claimed or refunded between validation and
                // the conditional claim; the transaction rolled back.
                RepositoryError::BusinessRule(msg) => {
                    AppError::not_eligible(reason::EARNING_NOT_AVAILABLE, msg)
                }
                other => other.into(),
            })?;

        info!(
            "Payout batch {} created for instructor {}: {} earnings, final amount {}",
            created.id,
            instructor_id,
            earning_ids.len(),
            created.final_amount
        );

        Ok(created)
    }

    /// Advance a payout batch's lifecycle under administrator action.
    pub async fn transition(
        &self,
        payment_id: Uuid,
        next: PaymentStatus,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<Payment> {
        let updated = self
            .payment_repo
            .transition_status(payment_id, next, admin_id, notes)
            .await
            .map_err(|e| match e {
                RepositoryError::BusinessRule(msg) => {
                    AppError::not_eligible(reason::INVALID_STATUS_TRANSITION, msg)
                }
                other => other.into(),
            })?;

        info!(
            "Payout batch {} moved to {} by {}",
            payment_id,
            next.as_str(),
            admin_id
        );

        Ok(updated)
    }

    pub async fn get(&self, payment_id: Uuid) -> AppResult<Payment> {
        self.payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))
    }

    pub async fn list_for_instructor(&self, instructor_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self.payment_repo.find_by_instructor(instructor_id).await?)
    }
}
