//! Edura Settlement Backend Library
//!
//! This module exposes the settlement components for use by tests and
//! other consumers.

pub mod commission;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use repositories::*;
use services::{
    CouponGateway, EarningService, EnrollmentGateway, FiscalAuditService, FlatRateWithholding,
    PayoutService, RefundService,
};
use std::sync::Arc;

/// Application state containing all repositories and services
pub struct AppState {
    pub database: Database,
    pub user_repo: Arc<UserRepository>,
    pub product_repo: Arc<ProductRepository>,
    pub sale_repo: Arc<SaleRepository>,
    pub earning_repo: Arc<EarningRepository>,
    pub payment_repo: Arc<PaymentRepository>,
    pub refund_repo: Arc<RefundRepository>,
    pub wallet_repo: Arc<WalletRepository>,
    pub settings_repo: Arc<CommissionSettingsRepository>,
    pub earning_service: Arc<EarningService>,
    pub payout_service: Arc<PayoutService>,
    pub refund_service: Arc<RefundService>,
}

impl AppState {
    /// Create a new AppState with initialized repositories and services
    pub fn new(
        pool: sqlx::PgPool,
        coupon_gateway: Arc<dyn CouponGateway>,
        enrollment_gateway: Arc<dyn EnrollmentGateway>,
        fiscal_audit: Option<Arc<FiscalAuditService>>,
    ) -> Self {
        let database = Database::new(pool.clone());

        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let product_repo = Arc::new(ProductRepository::new(pool.clone()));
        let sale_repo = Arc::new(SaleRepository::new(pool.clone()));
        let earning_repo = Arc::new(EarningRepository::new(pool.clone()));
        let payment_repo = Arc::new(PaymentRepository::new(pool.clone()));
        let refund_repo = Arc::new(RefundRepository::new(pool.clone()));
        let wallet_repo = Arc::new(WalletRepository::new(pool.clone()));
        let settings_repo = Arc::new(CommissionSettingsRepository::new(pool.clone()));

        let earning_service = Arc::new(EarningService::new(
            sale_repo.clone(),
            product_repo.clone(),
            earning_repo.clone(),
            settings_repo.clone(),
            coupon_gateway,
            Arc::new(FlatRateWithholding::default()),
            fiscal_audit.clone(),
        ));

        let payout_service = Arc::new(PayoutService::new(
            payment_repo.clone(),
            earning_repo.clone(),
            user_repo.clone(),
            settings_repo.clone(),
        ));

        let refund_service = Arc::new(RefundService::new(
            pool,
            refund_repo.clone(),
            earning_repo.clone(),
            wallet_repo.clone(),
            sale_repo.clone(),
            enrollment_gateway,
            fiscal_audit,
        ));

        Self {
            database,
            user_repo,
            product_repo,
            sale_repo,
            earning_repo,
            payment_repo,
            refund_repo,
            wallet_repo,
            settings_repo,
            earning_service,
            payout_service,
            refund_service,
        }
    }
}
