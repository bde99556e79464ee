//! API handlers for the settlement service

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CommissionSettings, CustomRate, Earning, EarningStatus, Payment, PaymentStatus, Refund,
    Wallet, WalletTransaction,
};
use crate::AppState;

/// Standard JSON envelope for all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            reason_code: None,
        })
    }
}

type HandlerResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

/// Map an application error onto the envelope with its HTTP status.
fn fail<T>(err: AppError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(err.to_string()),
            reason_code: err.reason_code(),
        }),
    )
}

// ===== Webhook Handlers =====

#[derive(Debug, Deserialize)]
pub struct PaymentWebhookRequest {
    pub sale_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentWebhookResponse {
    pub sale_id: Uuid,
    pub earnings_created: usize,
    pub line_items_skipped: usize,
    pub already_processed: bool,
}

/// Gateway "sale paid" notification. Safe to redeliver: only the first
/// delivery wins the paid transition, and the earning pass itself is
/// idempotent per line item.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PaymentWebhookRequest>,
) -> HandlerResult<PaymentWebhookResponse> {
    let won_transition = match state.sale_repo.mark_paid(request.sale_id).await {
        Ok(sale) => sale.is_some(),
        Err(e) => return Err(fail(e.into())),
    };

    if !won_transition {
        // Redelivery: the sale must at least exist and be paid
        match state.sale_repo.find_by_id(request.sale_id).await {
            Ok(Some(sale)) if sale.is_paid() => {}
            Ok(Some(sale)) => {
                return Err(fail(AppError::not_eligible(
                    crate::error::reason::SALE_NOT_PAID,
                    format!("Sale {} is {}", request.sale_id, sale.status),
                )))
            }
            Ok(None) => {
                return Err(fail(AppError::NotFound(format!(
                    "Sale {} not found",
                    request.sale_id
                ))))
            }
            Err(e) => return Err(fail(e.into())),
        }
    }

    // Run the creation pass either way; on redelivery it is a no-op pass
    match state.earning_service.record_sale_paid(request.sale_id).await {
        Ok(summary) => Ok(ApiResponse::ok(PaymentWebhookResponse {
            sale_id: request.sale_id,
            earnings_created: summary.created.len(),
            line_items_skipped: summary.skipped,
            already_processed: !won_transition,
        })),
        Err(e) => Err(fail(e)),
    }
}

// ===== Payout Batch Handlers =====

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub instructor_id: Uuid,
    pub earning_ids: Vec<Uuid>,
    pub deductions: Option<Decimal>,
    pub notes: Option<String>,
    pub admin_id: Uuid,
}

pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePaymentRequest>,
) -> HandlerResult<Payment> {
    match state
        .payout_service
        .create_payment(
            request.instructor_id,
            request.earning_ids,
            request.deductions,
            request.notes,
            request.admin_id,
        )
        .await
    {
        Ok(payment) => Ok(ApiResponse::ok(payment)),
        Err(e) => Err(fail(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionPaymentRequest {
    pub admin_id: Uuid,
    pub notes: Option<String>,
}

async fn transition_payment(
    state: Arc<AppState>,
    payment_id: Uuid,
    next: PaymentStatus,
    request: TransitionPaymentRequest,
) -> HandlerResult<Payment> {
    match state
        .payout_service
        .transition(payment_id, next, request.admin_id, request.notes)
        .await
    {
        Ok(payment) => Ok(ApiResponse::ok(payment)),
        Err(e) => Err(fail(e)),
    }
}

pub async fn process_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<TransitionPaymentRequest>,
) -> HandlerResult<Payment> {
    transition_payment(state, payment_id, PaymentStatus::Processing, request).await
}

pub async fn complete_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<TransitionPaymentRequest>,
) -> HandlerResult<Payment> {
    transition_payment(state, payment_id, PaymentStatus::Completed, request).await
}

pub async fn fail_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<TransitionPaymentRequest>,
) -> HandlerResult<Payment> {
    transition_payment(state, payment_id, PaymentStatus::Failed, request).await
}

pub async fn cancel_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<TransitionPaymentRequest>,
) -> HandlerResult<Payment> {
    transition_payment(state, payment_id, PaymentStatus::Cancelled, request).await
}

pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
) -> HandlerResult<Payment> {
    match state.payout_service.get(payment_id).await {
        Ok(payment) => Ok(ApiResponse::ok(payment)),
        Err(e) => Err(fail(e)),
    }
}

pub async fn list_instructor_payments(
    State(state): State<Arc<AppState>>,
    Path(instructor_id): Path<Uuid>,
) -> HandlerResult<Vec<Payment>> {
    match state.payout_service.list_for_instructor(instructor_id).await {
        Ok(payments) => Ok(ApiResponse::ok(payments)),
        Err(e) => Err(fail(e)),
    }
}

// ===== Earning Handlers =====

#[derive(Debug, Deserialize)]
pub struct ListEarningsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EarningTotals {
    pub status: String,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct EarningsListResponse {
    pub earnings: Vec<Earning>,
    pub totals: Vec<EarningTotals>,
}

pub async fn list_instructor_earnings(
    State(state): State<Arc<AppState>>,
    Path(instructor_id): Path<Uuid>,
    Query(query): Query<ListEarningsQuery>,
) -> HandlerResult<EarningsListResponse> {
    let status = match query.status.as_deref() {
        Some(s) => match EarningStatus::from_str(s) {
            Ok(status) => Some(status),
            Err(e) => return Err(fail(AppError::Validation(e))),
        },
        None => None,
    };

    match state
        .earning_service
        .list_for_instructor(instructor_id, status)
        .await
    {
        Ok((earnings, totals)) => Ok(ApiResponse::ok(EarningsListResponse {
            earnings,
            totals: totals
                .into_iter()
                .map(|(status, count, total)| EarningTotals {
                    status,
                    count,
                    total,
                })
                .collect(),
        })),
        Err(e) => Err(fail(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    /// "disputed" or "blocked"
    pub status: String,
}

pub async fn hold_earning(
    State(state): State<Arc<AppState>>,
    Path(earning_id): Path<Uuid>,
    Json(request): Json<HoldRequest>,
) -> HandlerResult<Earning> {
    let hold = match EarningStatus::from_str(&request.status) {
        Ok(status) => status,
        Err(e) => return Err(fail(AppError::Validation(e))),
    };

    match state.earning_service.set_hold(earning_id, hold).await {
        Ok(earning) => Ok(ApiResponse::ok(earning)),
        Err(e) => Err(fail(e)),
    }
}

pub async fn release_earning(
    State(state): State<Arc<AppState>>,
    Path(earning_id): Path<Uuid>,
) -> HandlerResult<Earning> {
    match state.earning_service.release_hold(earning_id).await {
        Ok(earning) => Ok(ApiResponse::ok(earning)),
        Err(e) => Err(fail(e)),
    }
}

/// Idempotent backfill entry: re-run the earning pass for a sale.
pub async fn reconcile_sale(
    State(state): State<Arc<AppState>>,
    Path(sale_id): Path<Uuid>,
) -> HandlerResult<PaymentWebhookResponse> {
    match state.earning_service.reconcile_sale(sale_id).await {
        Ok(summary) => Ok(ApiResponse::ok(PaymentWebhookResponse {
            sale_id,
            earnings_created: summary.created.len(),
            line_items_skipped: summary.skipped,
            already_processed: summary.created.is_empty(),
        })),
        Err(e) => Err(fail(e)),
    }
}

// ===== Refund Handlers =====

#[derive(Debug, Deserialize)]
pub struct CreateRefundRequest {
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub requested_by: Uuid,
    pub reason: Option<String>,
}

pub async fn create_refund(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRefundRequest>,
) -> HandlerResult<Refund> {
    match state
        .refund_service
        .request_refund(
            request.sale_id,
            request.product_id,
            request.requested_by,
            request.reason,
        )
        .await
    {
        Ok(refund) => Ok(ApiResponse::ok(refund)),
        Err(e) => Err(fail(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewRefundRequest {
    /// "approved" or "rejected"
    pub status: String,
    pub admin_id: Uuid,
    pub admin_notes: Option<String>,
}

pub async fn review_refund(
    State(state): State<Arc<AppState>>,
    Path(refund_id): Path<Uuid>,
    Json(request): Json<ReviewRefundRequest>,
) -> HandlerResult<Refund> {
    let approve = match request.status.to_lowercase().as_str() {
        "approved" => true,
        "rejected" => false,
        other => {
            return Err(fail(AppError::Validation(format!(
                "Review status must be 'approved' or 'rejected', got '{}'",
                other
            ))))
        }
    };

    match state
        .refund_service
        .review_refund(refund_id, approve, request.admin_id, request.admin_notes)
        .await
    {
        Ok(refund) => Ok(ApiResponse::ok(refund)),
        Err(e) => Err(fail(e)),
    }
}

pub async fn get_refund(
    State(state): State<Arc<AppState>>,
    Path(refund_id): Path<Uuid>,
) -> HandlerResult<Refund> {
    match state.refund_service.get(refund_id).await {
        Ok(refund) => Ok(ApiResponse::ok(refund)),
        Err(e) => Err(fail(e)),
    }
}

// ===== Commission Settings Handlers =====

pub async fn get_commission_settings(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<CommissionSettings> {
    match state.settings_repo.get_or_create().await {
        Ok(settings) => Ok(ApiResponse::ok(settings)),
        Err(e) => Err(fail(e.into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub default_commission_rate: Decimal,
    pub referral_commission_rate: Decimal,
    pub days_until_available: i32,
    pub minimum_payment_threshold: Decimal,
    pub admin_id: Uuid,
}

pub async fn update_commission_settings(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSettingsRequest>,
) -> HandlerResult<CommissionSettings> {
    // Validate before touching the singleton
    for (label, rate) in [
        ("default_commission_rate", request.default_commission_rate),
        ("referral_commission_rate", request.referral_commission_rate),
    ] {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(fail(AppError::Validation(format!(
                "{} must be within [0, 1]",
                label
            ))));
        }
    }
    if request.days_until_available < 0 {
        return Err(fail(AppError::Validation(
            "days_until_available must not be negative".to_string(),
        )));
    }
    if request.minimum_payment_threshold < Decimal::ZERO {
        return Err(fail(AppError::Validation(
            "minimum_payment_threshold must not be negative".to_string(),
        )));
    }

    match state
        .settings_repo
        .update(
            request.default_commission_rate,
            request.referral_commission_rate,
            request.days_until_available,
            request.minimum_payment_threshold,
            request.admin_id,
        )
        .await
    {
        Ok(settings) => Ok(ApiResponse::ok(settings)),
        Err(e) => Err(fail(e.into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertCustomRateRequest {
    pub instructor_id: Uuid,
    pub rate: Decimal,
    pub reason: String,
    pub effective_from: NaiveDate,
    pub admin_id: Uuid,
}

pub async fn upsert_custom_rate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpsertCustomRateRequest>,
) -> HandlerResult<CommissionSettings> {
    if request.rate < Decimal::ZERO || request.rate > Decimal::ONE {
        return Err(fail(AppError::Validation(
            "Custom rate must be within [0, 1]".to_string(),
        )));
    }

    let custom = CustomRate {
        instructor_id: request.instructor_id,
        rate: request.rate,
        reason: request.reason,
        effective_from: request.effective_from,
        set_by: request.admin_id,
    };

    match state
        .settings_repo
        .upsert_custom_rate(custom, request.admin_id)
        .await
    {
        Ok(settings) => Ok(ApiResponse::ok(settings)),
        Err(e) => Err(fail(e.into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveCustomRateQuery {
    pub admin_id: Uuid,
}

pub async fn remove_custom_rate(
    State(state): State<Arc<AppState>>,
    Path(instructor_id): Path<Uuid>,
    Query(query): Query<RemoveCustomRateQuery>,
) -> HandlerResult<CommissionSettings> {
    match state
        .settings_repo
        .remove_custom_rate(instructor_id, query.admin_id)
        .await
    {
        Ok(settings) => Ok(ApiResponse::ok(settings)),
        Err(e) => Err(fail(e.into())),
    }
}

// ===== Wallet Handlers =====

pub async fn get_wallet_balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> HandlerResult<Wallet> {
    match state.wallet_repo.get_or_create(user_id).await {
        Ok(wallet) => Ok(ApiResponse::ok(wallet)),
        Err(e) => Err(fail(e.into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub limit: Option<i64>,
}

pub async fn list_wallet_transactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> HandlerResult<Vec<WalletTransaction>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match state.wallet_repo.transactions(user_id, limit).await {
        Ok(transactions) => Ok(ApiResponse::ok(transactions)),
        Err(e) => Err(fail(e.into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct WalletAdjustmentRequest {
    pub user_id: Uuid,
    /// "credit" or "debit"
    pub direction: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub admin_id: Uuid,
}

/// Administrator manual wallet adjustment.
pub async fn adjust_wallet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WalletAdjustmentRequest>,
) -> HandlerResult<Wallet> {
    if request.amount <= Decimal::ZERO {
        return Err(fail(AppError::Validation(
            "Adjustment amount must be positive".to_string(),
        )));
    }

    let metadata = serde_json::json!({ "admin_id": request.admin_id, "manual": true });
    let description = request.description.as_deref().unwrap_or("Manual adjustment");

    let result = match request.direction.to_lowercase().as_str() {
        "credit" => {
            state
                .wallet_repo
                .credit(request.user_id, request.amount, Some(description), Some(metadata))
                .await
        }
        "debit" => {
            state
                .wallet_repo
                .debit(request.user_id, request.amount, Some(description), Some(metadata))
                .await
        }
        other => {
            return Err(fail(AppError::Validation(format!(
                "Direction must be 'credit' or 'debit', got '{}'",
                other
            ))))
        }
    };

    match result {
        Ok(wallet) => Ok(ApiResponse::ok(wallet)),
        Err(e) => Err(fail(e.into())),
    }
}
