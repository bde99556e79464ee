pub mod availability_sweep;
pub mod collaborators;
pub mod earning_service;
pub mod fiscal;
pub mod payout_service;
pub mod refund_service;

pub use availability_sweep::AvailabilitySweep;
pub use collaborators::{
    CouponGateway, DisabledCouponGateway, EnrollmentGateway, HttpCouponGateway,
    NoopEnrollmentGateway,
};
pub use earning_service::{EarningCreationSummary, EarningService};
pub use fiscal::{FiscalAuditService, FlatRateWithholding, WithholdingPolicy};
pub use payout_service::PayoutService;
pub use refund_service::RefundService;
