use crate::models::PaymentMethod;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Error types for commission calculations
#[derive(Error, Debug)]
pub enum CommissionError {
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Result type for commission calculations
pub type CommissionResult<T> = Result<T, CommissionError>;

/// Round to 2 decimal places, half away from zero.
/// All persisted monetary amounts go through this.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Gateway fee schedule: fee = round2((gross * percentage + fixed) * tax_multiplier)
///
/// The tax multiplier covers VAT charged on top of the processor's fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub percentage_rate: Decimal,
    pub fixed_fee: Decimal,
    pub tax_multiplier: Decimal,
}

impl FeeSchedule {
    pub const fn new(percentage_rate: Decimal, fixed_fee: Decimal, tax_multiplier: Decimal) -> Self {
        Self {
            percentage_rate,
            fixed_fee,
            tax_multiplier,
        }
    }

    /// Schedule for sales settled entirely from wallet balance.
    /// No gateway is involved, so no fee is charged.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO, Decimal::ONE)
    }

    /// Fee schedule for a payment method.
    pub fn for_method(method: PaymentMethod) -> Self {
        match method {
            // 3.95% + 4.00 fixed, 16% VAT on the fee
            PaymentMethod::Card => Self::new(
                Decimal::new(395, 4),
                Decimal::new(400, 2),
                Decimal::new(116, 2),
            ),
            // Bank transfer: flat 0.75% + 5.00, 16% VAT on the fee
            PaymentMethod::Transfer => Self::new(
                Decimal::new(75, 4),
                Decimal::new(500, 2),
                Decimal::new(116, 2),
            ),
            // Cash-in-store network: 3.5% + 3.00, 16% VAT on the fee
            PaymentMethod::Cash => Self::new(
                Decimal::new(35, 3),
                Decimal::new(300, 2),
                Decimal::new(116, 2),
            ),
            PaymentMethod::Wallet => Self::zero(),
        }
    }

    /// Gateway fee for a gross amount, clamped so it never exceeds the gross.
    pub fn fee_for(&self, gross: Decimal) -> Decimal {
        if gross <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let fee = round2((gross * self.percentage_rate + self.fixed_fee) * self.tax_multiplier);
        fee.min(gross)
    }
}

/// The outcome of splitting one gross sale amount.
///
/// Invariants, exact at 2-decimal precision:
/// `gateway_fee + net == gross` and `instructor_share + platform_share == net`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitResult {
    pub gross: Decimal,
    pub gateway_fee: Decimal,
    pub net: Decimal,
    pub commission_rate: Decimal,
    pub platform_share: Decimal,
    pub instructor_share: Decimal,
}

impl SplitResult {
    /// Zero result for non-positive gross amounts, so callers can skip
    /// zero-value line items without special-casing.
    pub fn noop(rate: Decimal) -> Self {
        Self {
            gross: Decimal::ZERO,
            gateway_fee: Decimal::ZERO,
            net: Decimal::ZERO,
            commission_rate: rate,
            platform_share: Decimal::ZERO,
            instructor_share: Decimal::ZERO,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.gross == Decimal::ZERO
    }
}

/// Split a gross sale amount into gateway fee, net, and party shares.
///
/// The platform share is rounded; the instructor share is the exact
/// remainder `net - platform_share`. Rounding both shares independently can
/// lose or invent a cent, so the remainder form is the only one allowed.
pub fn split(
    gross: Decimal,
    schedule: FeeSchedule,
    commission_rate: Decimal,
) -> CommissionResult<SplitResult> {
    if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE {
        return Err(CommissionError::InvalidRate(format!(
            "commission rate must be within [0, 1], got {}",
            commission_rate
        )));
    }

    if gross <= Decimal::ZERO {
        return Ok(SplitResult::noop(commission_rate));
    }

    let gross = round2(gross);
    let gateway_fee = schedule.fee_for(gross);
    let net = gross - gateway_fee;

    let platform_share = round2(net * commission_rate);
    let instructor_share = net - platform_share;

    Ok(SplitResult {
        gross,
        gateway_fee,
        net,
        commission_rate,
        platform_share,
        instructor_share,
    })
}

/// Pick the commission rate for one line item.
///
/// Custom per-instructor rate wins over the platform default; a validated
/// referral coupon overrides both with the referral rate.
pub fn select_rate(
    custom_rate: Option<Decimal>,
    default_rate: Decimal,
    referral_rate: Decimal,
    referral_validated: bool,
) -> Decimal {
    if referral_validated {
        referral_rate
    } else {
        custom_rate.unwrap_or(default_rate)
    }
}

/// Gateway-fee claw-back withheld from a refunded line item.
///
/// The processor does not return its fee on refund, so the platform deducts
/// the proportional fee from the credited amount. Wallet-paid lines carry a
/// zero schedule and therefore no claw-back.
pub fn refund_clawback(line_price: Decimal, schedule: FeeSchedule) -> Decimal {
    schedule.fee_for(line_price)
}

/// Amount credited back to the buyer for a refunded line item.
pub fn refund_amount(line_price: Decimal, schedule: FeeSchedule) -> Decimal {
    if line_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round2(line_price) - refund_clawback(round2(line_price), schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> FeeSchedule {
        FeeSchedule::for_method(PaymentMethod::Card)
    }

    #[test]
    fn test_card_fee_worked_example() {
        // fee = round2((15 * 0.0395 + 4) * 1.16) = 5.33
        let fee = card().fee_for(Decimal::new(1500, 2));
        assert_eq!(fee, Decimal::new(533, 2));
    }

    #[test]
    fn test_split_worked_example() {
        // gross 15.00, card fee 5.33, net 9.67, rate 0.30
        let result = split(Decimal::new(1500, 2), card(), Decimal::new(30, 2)).unwrap();
        assert_eq!(result.gateway_fee, Decimal::new(533, 2));
        assert_eq!(result.net, Decimal::new(967, 2));
        assert_eq!(result.platform_share, Decimal::new(290, 2));
        assert_eq!(result.instructor_share, Decimal::new(677, 2));
    }

    #[test]
    fn test_split_referral_rate_example() {
        // same sale at the referral rate 0.20
        let result = split(Decimal::new(1500, 2), card(), Decimal::new(20, 2)).unwrap();
        assert_eq!(result.platform_share, Decimal::new(193, 2));
        assert_eq!(result.instructor_share, Decimal::new(774, 2));
    }

    #[test]
    fn test_conservation() {
        // fee + net == gross and shares sum to net, exactly, across a sweep
        // of gross amounts and rates
        let rates = [
            Decimal::ZERO,
            Decimal::new(15, 2),
            Decimal::new(30, 2),
            Decimal::new(333, 3),
            Decimal::ONE,
        ];
        for cents in (1..5000).step_by(7) {
            let gross = Decimal::new(cents, 2);
            for rate in rates {
                let r = split(gross, card(), rate).unwrap();
                assert_eq!(r.gateway_fee + r.net, r.gross, "gross={}", gross);
                assert_eq!(
                    r.instructor_share + r.platform_share,
                    r.net,
                    "gross={} rate={}",
                    gross,
                    rate
                );
            }
        }
    }

    #[test]
    fn test_fee_clamped_to_gross() {
        // tiny gross: nominal fee exceeds the amount, so it is clamped
        let gross = Decimal::new(50, 2); // 0.50
        let r = split(gross, card(), Decimal::new(30, 2)).unwrap();
        assert_eq!(r.gateway_fee, gross);
        assert_eq!(r.net, Decimal::ZERO);
        assert_eq!(r.platform_share, Decimal::ZERO);
        assert_eq!(r.instructor_share, Decimal::ZERO);
    }

    #[test]
    fn test_non_positive_gross_is_noop() {
        let r = split(Decimal::ZERO, card(), Decimal::new(30, 2)).unwrap();
        assert!(r.is_noop());

        let r = split(Decimal::new(-100, 2), card(), Decimal::new(30, 2)).unwrap();
        assert!(r.is_noop());
        assert_eq!(r.instructor_share, Decimal::ZERO);
    }

    #[test]
    fn test_rate_out_of_range_rejected() {
        assert!(split(Decimal::ONE_HUNDRED, card(), Decimal::new(101, 2)).is_err());
        assert!(split(Decimal::ONE_HUNDRED, card(), Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_wallet_method_has_no_fee() {
        let r = split(
            Decimal::new(1500, 2),
            FeeSchedule::for_method(PaymentMethod::Wallet),
            Decimal::new(30, 2),
        )
        .unwrap();
        assert_eq!(r.gateway_fee, Decimal::ZERO);
        assert_eq!(r.net, Decimal::new(1500, 2));
    }

    #[test]
    fn test_select_rate_precedence() {
        let default = Decimal::new(30, 2);
        let referral = Decimal::new(20, 2);
        let custom = Decimal::new(25, 2);

        assert_eq!(select_rate(None, default, referral, false), default);
        assert_eq!(select_rate(Some(custom), default, referral, false), custom);
        // referral overrides both
        assert_eq!(select_rate(Some(custom), default, referral, true), referral);
        assert_eq!(select_rate(None, default, referral, true), referral);
    }

    #[test]
    fn test_refund_amount_deducts_clawback() {
        // card-paid line: 15.00 refunds 15.00 - 5.33 = 9.67
        let amount = refund_amount(Decimal::new(1500, 2), card());
        assert_eq!(amount, Decimal::new(967, 2));

        // wallet-paid line: full credit
        let amount = refund_amount(
            Decimal::new(1500, 2),
            FeeSchedule::for_method(PaymentMethod::Wallet),
        );
        assert_eq!(amount, Decimal::new(1500, 2));
    }

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(Decimal::new(53273, 4)), Decimal::new(533, 2)); // 5.3273
        assert_eq!(round2(Decimal::new(1005, 3)), Decimal::new(101, 2)); // 1.005
        assert_eq!(round2(Decimal::new(-1005, 3)), Decimal::new(-101, 2));
    }
}
