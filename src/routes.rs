//! Route definitions for the settlement API

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers::*;
use crate::AppState;

// Gateway webhook routes
pub fn webhook_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/webhooks/payment", post(payment_webhook))
}

// Payout batch routes
pub fn payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/payments", post(create_payment))
        .route("/api/payments/:id", get(get_payment))
        .route("/api/payments/:id/process", put(process_payment))
        .route("/api/payments/:id/complete", put(complete_payment))
        .route("/api/payments/:id/fail", put(fail_payment))
        .route("/api/payments/:id/cancel", put(cancel_payment))
        .route(
            "/api/instructors/:id/payments",
            get(list_instructor_payments),
        )
}

// Earning routes
pub fn earning_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/instructors/:id/earnings",
            get(list_instructor_earnings),
        )
        .route("/api/earnings/:id/hold", put(hold_earning))
        .route("/api/earnings/:id/release", put(release_earning))
        .route("/api/sales/:id/reconcile", post(reconcile_sale))
}

// Refund routes
pub fn refund_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/refunds", post(create_refund))
        .route("/api/refunds/:id", get(get_refund))
        .route("/api/refunds/:id/review", post(review_refund))
}

// Commission settings routes
pub fn settings_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/commission-settings", get(get_commission_settings))
        .route("/api/commission-settings", put(update_commission_settings))
        .route(
            "/api/commission-settings/custom-rates",
            put(upsert_custom_rate),
        )
        .route(
            "/api/commission-settings/custom-rates/:instructor_id",
            delete(remove_custom_rate),
        )
}

// Wallet routes
pub fn wallet_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/wallet/:user_id/balance", get(get_wallet_balance))
        .route(
            "/api/wallet/:user_id/transactions",
            get(list_wallet_transactions),
        )
        .route("/api/wallet/add-credit", post(adjust_wallet))
}
