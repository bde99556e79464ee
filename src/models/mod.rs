//! Domain models for the Edura settlement backend.
//!
//! This module contains all database-backed models representing
//! the entities of the earnings settlement engine.

pub mod commission_settings;
pub mod earning;
pub mod payment;
pub mod product;
pub mod refund;
pub mod sale;
pub mod user;
pub mod wallet;

// Re-export all models for convenient access
pub use commission_settings::{CommissionSettings, CustomRate};
pub use earning::{Earning, EarningStatus, FiscalBreakdown};
pub use payment::{apply_transition, Payment, PaymentStatus, StatusHistoryEntry};
pub use product::{Product, ProductKind};
pub use refund::{Refund, RefundStatus};
pub use sale::{PaymentMethod, Sale, SaleItem, SaleStatus};
pub use user::User;
pub use wallet::{Wallet, WalletTransaction, WalletTransactionType};
