pub mod commission_settings_repository;
pub mod earning_repository;
pub mod payment_repository;
pub mod product_repository;
pub mod refund_repository;
pub mod sale_repository;
pub mod user_repository;
pub mod wallet_repository;

// Re-export all repositories for convenient access
pub use commission_settings_repository::CommissionSettingsRepository;
pub use earning_repository::EarningRepository;
pub use payment_repository::PaymentRepository;
pub use product_repository::ProductRepository;
pub use refund_repository::RefundRepository;
pub use sale_repository::SaleRepository;
pub use user_repository::UserRepository;
pub use wallet_repository::WalletRepository;
