//! Commission calculation for instructor earnings.
//!
//! Pure arithmetic over `Decimal`: gateway fee schedules, the gross →
//! fee/net/share split, and the refund claw-back. No I/O lives here so the
//! settlement services can be tested against exact amounts.

pub mod split;

pub use split::{
    refund_amount, refund_clawback, round2, select_rate, split, CommissionError, CommissionResult,
    FeeSchedule, SplitResult,
};
