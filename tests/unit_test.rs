use edura_backend::commission::{self, round2, FeeSchedule};
use edura_backend::models::*;
use edura_backend::services::{FlatRateWithholding, WithholdingPolicy};
use rust_decimal::Decimal;
use uuid::Uuid;

fn card() -> FeeSchedule {
    FeeSchedule::for_method(PaymentMethod::Card)
}

/// Unit tests for the commission split calculator
#[test]
fn test_split_conservation_across_methods() {
    let methods = [
        PaymentMethod::Card,
        PaymentMethod::Transfer,
        PaymentMethod::Cash,
        PaymentMethod::Wallet,
    ];

    for method in methods {
        let schedule = FeeSchedule::for_method(method);
        for cents in [1i64, 49, 500, 1500, 9999, 125_000] {
            let gross = Decimal::new(cents, 2);
            let result = commission::split(gross, schedule, Decimal::new(30, 2)).unwrap();

            assert_eq!(
                result.gateway_fee + result.net,
                result.gross,
                "fee/net mismatch for {:?} at {}",
                method,
                gross
            );
            assert_eq!(
                result.instructor_share + result.platform_share,
                result.net,
                "share mismatch for {:?} at {}",
                method,
                gross
            );
        }
    }
}

#[test]
fn test_split_standard_sale() {
    // 15.00 on card: fee 5.33, net 9.67, 30% commission -> 2.90 / 6.77
    let result = commission::split(Decimal::new(1500, 2), card(), Decimal::new(30, 2)).unwrap();

    assert_eq!(result.gateway_fee, Decimal::new(533, 2));
    assert_eq!(result.net, Decimal::new(967, 2));
    assert_eq!(result.platform_share, Decimal::new(290, 2));
    assert_eq!(result.instructor_share, Decimal::new(677, 2));
}

#[test]
fn test_split_referral_sale() {
    // same sale at the 20% referral rate -> 1.93 / 7.74
    let result = commission::split(Decimal::new(1500, 2), card(), Decimal::new(20, 2)).unwrap();

    assert_eq!(result.platform_share, Decimal::new(193, 2));
    assert_eq!(result.instructor_share, Decimal::new(774, 2));
}

#[test]
fn test_zero_value_line_is_noop() {
    let result = commission::split(Decimal::ZERO, card(), Decimal::new(30, 2)).unwrap();
    assert!(result.is_noop());
    assert_eq!(result.instructor_share, Decimal::ZERO);
    assert_eq!(result.platform_share, Decimal::ZERO);
}

#[test]
fn test_rate_selection_precedence() {
    let default_rate = Decimal::new(30, 2);
    let referral_rate = Decimal::new(20, 2);
    let custom = Some(Decimal::new(22, 2));

    assert_eq!(
        commission::select_rate(None, default_rate, referral_rate, false),
        default_rate
    );
    assert_eq!(
        commission::select_rate(custom, default_rate, referral_rate, false),
        Decimal::new(22, 2)
    );
    assert_eq!(
        commission::select_rate(custom, default_rate, referral_rate, true),
        referral_rate
    );
}

#[test]
fn test_refund_clawback_by_method() {
    let line = Decimal::new(1500, 2);

    // card refund loses the gateway fee
    assert_eq!(commission::refund_amount(line, card()), Decimal::new(967, 2));

    // wallet refund is whole
    assert_eq!(
        commission::refund_amount(line, FeeSchedule::for_method(PaymentMethod::Wallet)),
        line
    );
}

/// Unit tests for the earning lifecycle
#[test]
fn test_earning_lifecycle_never_regresses() {
    use EarningStatus::*;

    // settled and refunded earnings are terminal
    for terminal in [Paid, Refunded] {
        for next in [Pending, Available, Paid, Disputed, Blocked, Refunded] {
            assert!(
                !terminal.can_transition_to(next),
                "{:?} must not move to {:?}",
                terminal,
                next
            );
        }
    }

    // the settlement path moves forward only
    assert!(Pending.can_transition_to(Available));
    assert!(Available.can_transition_to(Paid));
    assert!(!Available.can_transition_to(Pending));
}

#[test]
fn test_earning_snapshot_validation() {
    let now = chrono::Utc::now().naive_utc();
    let mut earning = Earning {
        id: Uuid::new_v4(),
        instructor_id: Uuid::new_v4(),
        sale_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        product_kind: "course".to_string(),
        sale_price: Decimal::new(1500, 2),
        gateway_fee_amount: Decimal::new(533, 2),
        platform_commission_rate: Decimal::new(30, 2),
        platform_commission_amount: Decimal::new(290, 2),
        instructor_earning: Decimal::new(677, 2),
        status: EarningStatus::Pending.as_str().to_string(),
        earned_at: now,
        available_at: now,
        paid_at: None,
        refunded_at: None,
        payment_id: None,
        refund_id: None,
        fiscal: None,
        created_at: now,
    };

    assert!(earning.validate().is_ok());

    // a cent lost to independent rounding must be caught
    earning.instructor_earning = Decimal::new(676, 2);
    assert!(earning.validate().is_err());
}

/// Unit tests for the payout batch lifecycle
#[test]
fn test_payment_history_is_projection_of_transitions() {
    let admin = Uuid::new_v4();
    let at = chrono::Utc::now().naive_utc();
    let mut history: Vec<StatusHistoryEntry> = Vec::new();
    let mut status = PaymentStatus::Pending;

    for next in [PaymentStatus::Processing, PaymentStatus::Completed] {
        let entry = payment::apply_transition(status, next, admin, None, at).unwrap();
        status = entry.status;
        history.push(entry);
    }

    assert_eq!(status, PaymentStatus::Completed);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, PaymentStatus::Processing);
    assert_eq!(history[1].status, PaymentStatus::Completed);
}

#[test]
fn test_payment_invalid_transitions_rejected() {
    let admin = Uuid::new_v4();
    let at = chrono::Utc::now().naive_utc();

    assert!(payment::apply_transition(
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        admin,
        None,
        at
    )
    .is_err());

    assert!(payment::apply_transition(
        PaymentStatus::Completed,
        PaymentStatus::Processing,
        admin,
        None,
        at
    )
    .is_err());
}

/// Unit tests for refund reconciliation amounts
#[test]
fn test_refund_validation() {
    let now = chrono::Utc::now().naive_utc();
    let refund = Refund {
        id: Uuid::new_v4(),
        sale_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        line_price: Decimal::new(1500, 2),
        clawback_amount: Decimal::new(533, 2),
        refund_amount: Decimal::new(967, 2),
        payment_method: "card".to_string(),
        status: RefundStatus::Pending.as_str().to_string(),
        reason: None,
        admin_notes: None,
        requested_by: Uuid::new_v4(),
        reviewed_by: None,
        earning_id: None,
        created_at: now,
        reviewed_at: None,
    };

    assert!(refund.validate().is_ok());

    let broken = Refund {
        refund_amount: Decimal::new(1000, 2),
        ..refund
    };
    assert!(broken.validate().is_err());
}

/// Unit tests for the withholding estimate
#[test]
fn test_withholding_breakdown_reconciles() {
    let policy = FlatRateWithholding::default();
    let b = policy.breakdown(Decimal::new(677, 2));

    assert_eq!(
        b.income_tax_withheld + b.vat_withheld + b.net_after_withholding,
        b.gross
    );
    assert_eq!(b.gross, Decimal::new(677, 2));
}

/// Unit tests for commission policy overrides
#[test]
fn test_custom_rate_lookup() {
    let instructor = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let now = chrono::Utc::now().naive_utc();
    let today = now.date();

    let settings = CommissionSettings {
        id: 1,
        default_commission_rate: Decimal::new(30, 2),
        referral_commission_rate: Decimal::new(20, 2),
        days_until_available: 7,
        minimum_payment_threshold: Decimal::new(5000, 2),
        custom_rates: serde_json::to_value(vec![CustomRate {
            instructor_id: instructor,
            rate: Decimal::new(15, 2),
            reason: "partner program".to_string(),
            effective_from: today,
            set_by: admin,
        }])
        .unwrap(),
        updated_by: Some(admin),
        created_at: now,
        updated_at: now,
    };

    assert_eq!(settings.rate_for(instructor, today), Some(Decimal::new(15, 2)));
    assert_eq!(settings.rate_for(Uuid::new_v4(), today), None);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_round2_is_half_away_from_zero() {
    assert_eq!(round2(Decimal::new(12345, 4)), Decimal::new(123, 2)); // 1.2345
    assert_eq!(round2(Decimal::new(12350, 4)), Decimal::new(124, 2)); // 1.2350
    assert_eq!(round2(Decimal::new(-12350, 4)), Decimal::new(-124, 2));
}
