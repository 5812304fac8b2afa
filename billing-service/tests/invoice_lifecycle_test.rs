//! Invoice generation and cash settlement integration tests.

mod common;

use billing_service::models::{InvoiceStatus, PaymentMethod, PaymentStatus};
use billing_service::services::repository::BillingRepository;
use billing_service::BillingError;
use common::TestHarness;
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::test]
async fn generate_invoice_prices_the_appointment() {
    let harness = TestHarness::new();
    let appointment_id = harness.seed_appointment(Decimal::from(500_000)).await;

    let invoice = harness
        .orchestrator
        .generate_invoice(appointment_id)
        .await
        .expect("Failed to generate invoice");

    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.subtotal, Decimal::from(500_000));
    // 8% configured tax rate.
    assert_eq!(invoice.tax, Decimal::from(40_000));
    assert_eq!(invoice.discount, Decimal::ZERO);
    assert_eq!(
        invoice.total_amount,
        invoice.subtotal - invoice.discount + invoice.tax
    );
    assert!(invoice.invoice_number.starts_with("INV-"));
    assert!(invoice.paid_at.is_none());
}

#[tokio::test]
async fn generate_invoice_twice_for_one_appointment_is_rejected() {
    let harness = TestHarness::new();
    let appointment_id = harness.seed_appointment(Decimal::from(100_000)).await;

    let first = harness
        .orchestrator
        .generate_invoice(appointment_id)
        .await
        .expect("Failed to generate invoice");

    let second = harness.orchestrator.generate_invoice(appointment_id).await;
    assert!(matches!(
        second,
        Err(BillingError::InvoiceAlreadyExists { .. })
    ));

    // The first invoice stands untouched.
    let stored = harness
        .repository
        .find_invoice(first.id)
        .await
        .unwrap()
        .expect("Missing invoice");
    assert_eq!(stored.status, InvoiceStatus::Pending);
}

#[tokio::test]
async fn generate_invoice_for_unknown_appointment_fails() {
    let harness = TestHarness::new();

    let result = harness.orchestrator.generate_invoice(Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(BillingError::AppointmentNotFound(_))
    ));
}

#[tokio::test]
async fn cash_payment_settles_invoice_and_payment_together() {
    let harness = TestHarness::new();
    let invoice = harness.seed_invoice(Decimal::from(350_000)).await;
    let cashier = Uuid::new_v4();

    let (invoice, payment) = harness
        .orchestrator
        .record_cash_payment(invoice.id, cashier, Some("paid at front desk".to_string()))
        .await
        .expect("Failed to record cash payment");

    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert!(invoice.paid_at.is_some());
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.payment_method, PaymentMethod::Cash);
    assert_eq!(payment.amount, invoice.total_amount);
    assert_eq!(payment.received_by, Some(cashier));
    assert!(payment.idempotency_key.is_none());

    let events = harness.notifier.events().await;
    assert_eq!(events, vec![format!("succeeded:{}", payment.id)]);
}

#[tokio::test]
async fn cash_payment_on_paid_invoice_reports_both_states() {
    let harness = TestHarness::new();
    let invoice = harness.seed_invoice(Decimal::from(100_000)).await;
    let cashier = Uuid::new_v4();

    harness
        .orchestrator
        .record_cash_payment(invoice.id, cashier, None)
        .await
        .expect("Failed to record cash payment");

    match harness
        .orchestrator
        .record_cash_payment(invoice.id, cashier, None)
        .await
    {
        Err(BillingError::InvalidStateTransition {
            entity,
            current,
            expected,
            ..
        }) => {
            assert_eq!(entity, "invoice");
            assert_eq!(current, "paid");
            assert_eq!(expected, "pending");
        }
        other => panic!("expected InvalidStateTransition, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn cash_payment_on_unknown_invoice_fails() {
    let harness = TestHarness::new();

    let result = harness
        .orchestrator
        .record_cash_payment(Uuid::new_v4(), Uuid::new_v4(), None)
        .await;
    assert!(matches!(result, Err(BillingError::InvoiceNotFound(_))));
}
