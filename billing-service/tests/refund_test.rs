//! Refund processing integration tests.

mod common;

use billing_service::models::PaymentStatus;
use billing_service::services::repository::BillingRepository;
use billing_service::BillingError;
use common::TestHarness;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Drive a payment through checkout and a successful verdict.
async fn settled_payment(harness: &TestHarness, subtotal: Decimal) -> Uuid {
    let (_, payment) = harness.seed_processing_payment(subtotal).await;
    harness
        .orchestrator
        .handle_gateway_callback(&harness.success_params(&payment))
        .await
        .expect("Failed to settle payment");
    payment.id
}

#[tokio::test]
async fn full_refund_clears_with_gateway_first() {
    let harness = TestHarness::new();
    let payment_id = settled_payment(&harness, Decimal::from(200_000)).await;
    let total = Decimal::from(216_000); // 200,000 + 8% tax

    let payment = harness
        .orchestrator
        .process_refund(
            payment_id,
            total,
            "appointment cancelled".to_string(),
            "staff-01".to_string(),
        )
        .await
        .expect("Failed to process refund");

    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert_eq!(payment.refund_amount, Some(total));
    assert_eq!(
        payment.refund_reason.as_deref(),
        Some("appointment cancelled")
    );
    assert!(payment.refund_date.is_some());

    // Settlement verdict plus refund response in the archive.
    assert_eq!(harness.repository.archive_count(payment_id).await, 2);
    assert!(harness
        .notifier
        .events()
        .await
        .contains(&format!("refunded:{}", payment_id)));
}

#[tokio::test]
async fn partial_refund_stays_within_paid_amount() {
    let harness = TestHarness::new();
    let payment_id = settled_payment(&harness, Decimal::from(200_000)).await;

    let payment = harness
        .orchestrator
        .process_refund(
            payment_id,
            Decimal::from(50_000),
            "one service not rendered".to_string(),
            "staff-01".to_string(),
        )
        .await
        .expect("Failed to process refund");

    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert_eq!(payment.refund_amount, Some(Decimal::from(50_000)));
    assert!(payment.refund_amount.unwrap() <= payment.amount);
}

#[tokio::test]
async fn refund_above_paid_amount_is_rejected_locally() {
    let harness = TestHarness::new();
    let payment_id = settled_payment(&harness, Decimal::from(200_000)).await;

    let result = harness
        .orchestrator
        .process_refund(
            payment_id,
            Decimal::from(1_000_000),
            "too much".to_string(),
            "staff-01".to_string(),
        )
        .await;
    assert!(matches!(result, Err(BillingError::InvalidRefundAmount { .. })));

    // Local rejection never reaches the gateway or the archive.
    assert_eq!(harness.repository.archive_count(payment_id).await, 1);
    let stored = harness
        .repository
        .find_payment(payment_id)
        .await
        .unwrap()
        .expect("Missing payment");
    assert_eq!(stored.status, PaymentStatus::Success);
}

#[tokio::test]
async fn second_refund_is_rejected() {
    let harness = TestHarness::new();
    let payment_id = settled_payment(&harness, Decimal::from(200_000)).await;

    harness
        .orchestrator
        .process_refund(
            payment_id,
            Decimal::from(10_000),
            "partial".to_string(),
            "staff-01".to_string(),
        )
        .await
        .expect("Failed to process refund");

    let again = harness
        .orchestrator
        .process_refund(
            payment_id,
            Decimal::from(10_000),
            "again".to_string(),
            "staff-01".to_string(),
        )
        .await;
    assert!(matches!(
        again,
        Err(BillingError::InvalidStateTransition { current: "refunded", .. })
    ));
}

#[tokio::test]
async fn gateway_declined_refund_leaves_payment_settled() {
    let harness = TestHarness::new();
    let payment_id = settled_payment(&harness, Decimal::from(200_000)).await;
    *harness.gateway.refund_code.lock().await = "94".to_string();

    let result = harness
        .orchestrator
        .process_refund(
            payment_id,
            Decimal::from(50_000),
            "declined upstream".to_string(),
            "staff-01".to_string(),
        )
        .await;

    match result {
        Err(BillingError::RefundDeclined { code, .. }) => assert_eq!(code, "94"),
        other => panic!("expected RefundDeclined, got {:?}", other.map(|_| ())),
    }

    let stored = harness
        .repository
        .find_payment(payment_id)
        .await
        .unwrap()
        .expect("Missing payment");
    assert_eq!(stored.status, PaymentStatus::Success);
    assert!(stored.refund_amount.is_none());
    // The declined response is still archived.
    assert_eq!(harness.repository.archive_count(payment_id).await, 2);
}

#[tokio::test]
async fn cash_refund_skips_the_gateway() {
    let harness = TestHarness::new();
    let invoice = harness.seed_invoice(Decimal::from(100_000)).await;
    let (_, payment) = harness
        .orchestrator
        .record_cash_payment(invoice.id, Uuid::new_v4(), None)
        .await
        .expect("Failed to record cash payment");

    // A scripted decline would fail the refund if the gateway were
    // consulted.
    *harness.gateway.refund_code.lock().await = "99".to_string();

    let refunded = harness
        .orchestrator
        .process_refund(
            payment.id,
            payment.amount,
            "returned from the drawer".to_string(),
            "staff-01".to_string(),
        )
        .await
        .expect("Failed to refund cash payment");

    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(harness.repository.archive_count(payment.id).await, 0);
}

#[tokio::test]
async fn refund_on_processing_payment_is_rejected() {
    let harness = TestHarness::new();
    let (_, payment) = harness.seed_processing_payment(Decimal::from(100_000)).await;

    let result = harness
        .orchestrator
        .process_refund(
            payment.id,
            Decimal::from(1_000),
            "not settled yet".to_string(),
            "staff-01".to_string(),
        )
        .await;
    assert!(matches!(
        result,
        Err(BillingError::InvalidStateTransition { current: "processing", .. })
    ));
}
