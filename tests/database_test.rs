//! Database-backed settlement flow tests.
//!
//! These exercise the repositories and services against a real Postgres.
//! Run them with a provisioned database:
//!     TEST_DATABASE_URL=postgresql://... cargo test -- --ignored

mod helpers;

use edura_backend::error::{reason, AppError};
use edura_backend::models::*;
use helpers::*;
use rust_decimal::Decimal;

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_duplicate_sale_notification_creates_single_earning() {
    let db = TestDatabase::new().await;
    db.configure_policy(7, Decimal::new(5000, 2)).await;
    let fixtures = TestFixtures::create(&db).await;

    let first = db
        .state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .expect("first pass should succeed");
    assert_eq!(first.created.len(), 1);
    assert_eq!(first.skipped, 0);

    // Redelivered notification: the pass is a no-op, not an error
    let second = db
        .state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .expect("second pass should succeed");
    assert_eq!(second.created.len(), 0);
    assert_eq!(second.skipped, 1);

    let earnings = db
        .state
        .earning_repo
        .find_by_instructor(fixtures.instructor.id, None)
        .await
        .unwrap();
    assert_eq!(earnings.len(), 1);

    // 15.00 card sale at 30%: fee 5.33, net 9.67, instructor 6.77
    let earning = &earnings[0];
    assert_eq!(earning.gateway_fee_amount, Decimal::new(533, 2));
    assert_eq!(earning.instructor_earning, Decimal::new(677, 2));
    assert_eq!(earning.status, EarningStatus::Pending.as_str());
    earning.validate().expect("snapshot must reconcile");
}

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_sweep_promotes_only_due_earnings() {
    let db = TestDatabase::new().await;
    db.configure_policy(7, Decimal::new(5000, 2)).await;
    let fixtures = TestFixtures::create(&db).await;

    db.state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .unwrap();

    // Inside the grace period: nothing to promote
    let sweep = edura_backend::services::AvailabilitySweep::new(db.state.earning_repo.clone());
    let promoted = sweep.run_once().await.unwrap();
    assert_eq!(promoted, 0);

    let earning = &db
        .state
        .earning_repo
        .find_by_instructor(fixtures.instructor.id, None)
        .await
        .unwrap()[0];
    assert_eq!(earning.status, EarningStatus::Pending.as_str());

    // Let the grace period elapse
    sqlx::query("UPDATE earnings SET available_at = NOW() - INTERVAL '1 day' WHERE id = $1")
        .bind(earning.id)
        .execute(&db.pool)
        .await
        .unwrap();

    let promoted = sweep.run_once().await.unwrap();
    assert_eq!(promoted, 1);

    // Re-running finds nothing left
    let promoted = sweep.run_once().await.unwrap();
    assert_eq!(promoted, 0);

    let earning = db.state.earning_repo.find_by_id(earning.id).await.unwrap().unwrap();
    assert_eq!(earning.status, EarningStatus::Available.as_str());
}

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_payout_batch_claims_all_earnings_atomically() {
    let db = TestDatabase::new().await;
    // Zero-day grace period: earnings are available immediately
    db.configure_policy(0, Decimal::new(1000, 2)).await;
    let fixtures = TestFixtures::create_with(&db, PaymentMethod::Card, Decimal::new(10000, 2)).await;

    db.state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .unwrap();
    for _ in 0..2 {
        let (_, sale) = fixtures.add_paid_sale(&db, Decimal::new(10000, 2)).await;
        db.state.earning_service.record_sale_paid(sale.id).await.unwrap();
    }

    let available = db
        .state
        .earning_repo
        .find_by_instructor(fixtures.instructor.id, Some(EarningStatus::Available))
        .await
        .unwrap();
    assert_eq!(available.len(), 3);

    let total: Decimal = available.iter().map(|e| e.instructor_earning).sum();
    let ids: Vec<_> = available.iter().map(|e| e.id).collect();
    let deductions = Decimal::new(1000, 2);

    let payment = db
        .state
        .payout_service
        .create_payment(
            fixtures.instructor.id,
            ids.clone(),
            Some(deductions),
            Some("June payout".to_string()),
            fixtures.admin.id,
        )
        .await
        .expect("payout creation should succeed");

    assert_eq!(payment.total_earnings, total);
    assert_eq!(payment.final_amount, total - deductions);
    assert_eq!(payment.status, PaymentStatus::Pending.as_str());

    // Every claimed earning is paid and references the batch
    for id in &ids {
        let earning = db.state.earning_repo.find_by_id(*id).await.unwrap().unwrap();
        assert_eq!(earning.status, EarningStatus::Paid.as_str());
        assert_eq!(earning.payment_id, Some(payment.id));
        assert!(earning.paid_at.is_some());
    }

    // A second batch over the same earnings must be rejected outright
    let err = db
        .state
        .payout_service
        .create_payment(fixtures.instructor.id, ids, None, None, fixtures.admin.id)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some(reason::EARNING_NOT_AVAILABLE));

    // Lifecycle advance appends history
    let payment = db
        .state
        .payout_service
        .transition(payment.id, PaymentStatus::Processing, fixtures.admin.id, None)
        .await
        .unwrap();
    let payment = db
        .state
        .payout_service
        .transition(payment.id, PaymentStatus::Completed, fixtures.admin.id, None)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed.as_str());
    assert!(payment.completed_at.is_some());
    assert_eq!(payment.status_history_vec().len(), 3); // pending, processing, completed
}

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_payout_requires_payout_method_and_threshold() {
    let db = TestDatabase::new().await;
    db.configure_policy(0, Decimal::new(5000, 2)).await;
    let fixtures = TestFixtures::create_with(&db, PaymentMethod::Card, Decimal::new(2000, 2)).await;

    db.state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .unwrap();
    let available = db
        .state
        .earning_repo
        .find_by_instructor(fixtures.instructor.id, Some(EarningStatus::Available))
        .await
        .unwrap();
    let ids: Vec<_> = available.iter().map(|e| e.id).collect();

    // Below the 50.00 minimum threshold
    let err = db
        .state
        .payout_service
        .create_payment(fixtures.instructor.id, ids.clone(), None, None, fixtures.admin.id)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some(reason::BELOW_MINIMUM_THRESHOLD));

    // No payout destination configured
    db.state
        .user_repo
        .set_payout_method(fixtures.instructor.id, None)
        .await
        .unwrap();
    let err = db
        .state
        .payout_service
        .create_payment(fixtures.instructor.id, ids, None, None, fixtures.admin.id)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some(reason::NO_PAYOUT_METHOD));
}

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_refund_rejected_once_instructor_paid() {
    let db = TestDatabase::new().await;
    db.configure_policy(0, Decimal::new(1000, 2)).await;
    let fixtures = TestFixtures::create_with(&db, PaymentMethod::Card, Decimal::new(10000, 2)).await;

    db.state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .unwrap();
    let available = db
        .state
        .earning_repo
        .find_by_instructor(fixtures.instructor.id, Some(EarningStatus::Available))
        .await
        .unwrap();
    let ids: Vec<_> = available.iter().map(|e| e.id).collect();

    db.state
        .payout_service
        .create_payment(fixtures.instructor.id, ids, None, None, fixtures.admin.id)
        .await
        .unwrap();

    let refund = db
        .state
        .refund_service
        .request_refund(
            fixtures.sale.id,
            fixtures.product.id,
            fixtures.buyer.id,
            Some("changed my mind".to_string()),
        )
        .await
        .unwrap();

    let err = db
        .state
        .refund_service
        .review_refund(refund.id, true, fixtures.admin.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some(reason::INSTRUCTOR_ALREADY_PAID));
    assert!(matches!(err, AppError::Eligibility { .. }));

    // No mutation happened: earning still paid, wallet still empty
    let earning = &db
        .state
        .earning_repo
        .find_by_instructor(fixtures.instructor.id, None)
        .await
        .unwrap()[0];
    assert_eq!(earning.status, EarningStatus::Paid.as_str());
    assert!(earning.refund_id.is_none());

    let wallet = db.state.wallet_repo.get_or_create(fixtures.buyer.id).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
}

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_refund_approval_reverses_earning_and_credits_wallet() {
    let db = TestDatabase::new().await;
    db.configure_policy(7, Decimal::new(5000, 2)).await;
    let fixtures = TestFixtures::create(&db).await;

    db.state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .unwrap();

    let refund = db
        .state
        .refund_service
        .request_refund(fixtures.sale.id, fixtures.product.id, fixtures.buyer.id, None)
        .await
        .unwrap();

    // card line 15.00: claw-back 5.33, credit 9.67
    assert_eq!(refund.clawback_amount, Decimal::new(533, 2));
    assert_eq!(refund.refund_amount, Decimal::new(967, 2));

    let completed = db
        .state
        .refund_service
        .review_refund(refund.id, true, fixtures.admin.id, Some("approved".to_string()))
        .await
        .unwrap();
    assert_eq!(completed.status, RefundStatus::Completed.as_str());

    let earning = &db
        .state
        .earning_repo
        .find_by_instructor(fixtures.instructor.id, None)
        .await
        .unwrap()[0];
    assert_eq!(earning.status, EarningStatus::Refunded.as_str());
    assert_eq!(earning.refund_id, Some(refund.id));
    assert_eq!(completed.earning_id, Some(earning.id));

    let wallet = db.state.wallet_repo.get_or_create(fixtures.buyer.id).await.unwrap();
    assert_eq!(wallet.balance, Decimal::new(967, 2));

    let transactions = db.state.wallet_repo.transactions(fixtures.buyer.id, 10).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].balance_after, Decimal::new(967, 2));

    // A second review attempt is rejected
    let err = db
        .state
        .refund_service
        .review_refund(refund.id, true, fixtures.admin.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some(reason::REFUND_ALREADY_REVIEWED));
}

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_wallet_refund_has_no_clawback() {
    let db = TestDatabase::new().await;
    db.configure_policy(7, Decimal::new(5000, 2)).await;
    let fixtures = TestFixtures::create_with(&db, PaymentMethod::Wallet, Decimal::new(1500, 2)).await;

    db.state
        .earning_service
        .record_sale_paid(fixtures.sale.id)
        .await
        .unwrap();

    let refund = db
        .state
        .refund_service
        .request_refund(fixtures.sale.id, fixtures.product.id, fixtures.buyer.id, None)
        .await
        .unwrap();

    assert_eq!(refund.clawback_amount, Decimal::ZERO);
    assert_eq!(refund.refund_amount, Decimal::new(1500, 2));
}

#[tokio::test]
#[ignore = "requires a running Postgres (set TEST_DATABASE_URL)"]
async fn test_wallet_debit_never_goes_negative() {
    let db = TestDatabase::new().await;
    let buyer = db.create_admin().await;

    let wallet = db.state.wallet_repo.get_or_create(buyer.id).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);

    db.state
        .wallet_repo
        .credit(buyer.id, Decimal::new(5000, 2), Some("promo credit"), None)
        .await
        .unwrap();

    // Over-debit is rejected with no mutation
    let err = db
        .state
        .wallet_repo
        .debit(buyer.id, Decimal::new(7000, 2), Some("purchase"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        edura_backend::error::RepositoryError::BusinessRule(_)
    ));

    let wallet = db.state.wallet_repo.get_or_create(buyer.id).await.unwrap();
    assert_eq!(wallet.balance, Decimal::new(5000, 2));

    db.state
        .wallet_repo
        .debit(buyer.id, Decimal::new(3000, 2), Some("purchase"), None)
        .await
        .unwrap();

    let wallet = db.state.wallet_repo.get_or_create(buyer.id).await.unwrap();
    assert_eq!(wallet.balance, Decimal::new(2000, 2));

    // Every movement captured balance_after at write time
    let transactions = db.state.wallet_repo.transactions(buyer.id, 10).await.unwrap();
    assert_eq!(transactions.len(), 2);
}
