//! Shared test fixtures for billing-service integration tests.
//!
//! Provides an in-memory repository with the same guarded-update
//! contract as the Postgres implementation, a scripted gateway fake,
//! a recording notifier and a stub appointment directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use billing_service::models::{
    money, Appointment, CreateArchive, GatewayArchive, Invoice, InvoiceStatus, Payment,
    PaymentMethod, PaymentStatus, ServiceLineItem,
};
use billing_service::services::gateway::{
    CallbackStatus, CallbackVerification, GatewayError, PaymentGateway, PaymentUrl,
    PaymentUrlRequest, RefundOutcome, RefundRequest, TransactionQuery,
};
use billing_service::services::notifications::{PaymentEventContext, PaymentNotifier};
use billing_service::services::repository::{AppointmentDirectory, BillingRepository};
use billing_service::{BillingOrchestrator, OrchestratorSettings};
use clinic_core::error::AppError;

static TRACING: Lazy<()> = Lazy::new(|| {
    clinic_core::observability::logging::init_tracing("billing-service-tests", "warn");
});

// ---------------------------------------------------------------------------
// In-memory repository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Store {
    invoices: HashMap<Uuid, Invoice>,
    payments: HashMap<Uuid, Payment>,
    archives: Vec<GatewayArchive>,
}

/// Repository double honoring the compare-and-swap contract: guarded
/// updates land only when the stored status matches the expectation.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    /// When set, the next lookup by order reference fails once.
    pub fail_next_order_ref_lookup: AtomicBool,
}

impl InMemoryRepository {
    pub async fn archive_count(&self, payment_id: Uuid) -> usize {
        self.store
            .lock()
            .await
            .archives
            .iter()
            .filter(|a| a.payment_id == Some(payment_id))
            .count()
    }

    pub async fn unresolved_archive_count(&self) -> usize {
        self.store
            .lock()
            .await
            .archives
            .iter()
            .filter(|a| a.payment_id.is_none())
            .count()
    }

    /// Overwrite a stored payment, bypassing guards. Test setup only.
    pub async fn put_payment(&self, payment: Payment) {
        self.store.lock().await.payments.insert(payment.id, payment);
    }

    /// Overwrite a stored invoice, bypassing guards. Test setup only.
    pub async fn put_invoice(&self, invoice: Invoice) {
        self.store.lock().await.invoices.insert(invoice.id, invoice);
    }
}

#[async_trait]
impl BillingRepository for InMemoryRepository {
    async fn create_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let mut store = self.store.lock().await;
        if store
            .invoices
            .values()
            .any(|i| i.appointment_id == invoice.appointment_id)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "appointment already invoiced"
            )));
        }
        store.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.store.lock().await.invoices.get(&id).cloned())
    }

    async fn find_invoice_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .store
            .lock()
            .await
            .invoices
            .values()
            .find(|i| i.appointment_id == appointment_id)
            .cloned())
    }

    async fn update_invoice(
        &self,
        invoice: &Invoice,
        expected: InvoiceStatus,
    ) -> Result<bool, AppError> {
        let mut store = self.store.lock().await;
        match store.invoices.get_mut(&invoice.id) {
            Some(stored) if stored.status == expected => {
                *stored = invoice.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_payment(&self, payment: &Payment) -> Result<(), AppError> {
        let mut store = self.store.lock().await;
        if store.payments.values().any(|p| p.order_ref == payment.order_ref) {
            return Err(AppError::Conflict(anyhow::anyhow!("order_ref taken")));
        }
        store.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.store.lock().await.payments.get(&id).cloned())
    }

    async fn find_payment_by_order_ref(&self, order_ref: &str) -> Result<Option<Payment>, AppError> {
        if self.fail_next_order_ref_lookup.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "connection reset during lookup"
            )));
        }
        Ok(self
            .store
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.order_ref == order_ref)
            .cloned())
    }

    async fn find_active_payment_by_idempotency_key(
        &self,
        invoice_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, AppError> {
        Ok(self
            .store
            .lock()
            .await
            .payments
            .values()
            .find(|p| {
                p.invoice_id == invoice_id
                    && p.idempotency_key.as_deref() == Some(idempotency_key)
                    && matches!(p.status, PaymentStatus::Pending | PaymentStatus::Processing)
            })
            .cloned())
    }

    async fn update_payment(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
    ) -> Result<bool, AppError> {
        let mut store = self.store.lock().await;
        match store.payments.get_mut(&payment.id) {
            Some(stored) if stored.status == expected => {
                *stored = payment.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_payment_and_invoice(
        &self,
        payment: &Payment,
        expected_payment: PaymentStatus,
        invoice: &Invoice,
        expected_invoice: InvoiceStatus,
    ) -> Result<bool, AppError> {
        let mut store = self.store.lock().await;

        let payment_matches = store
            .payments
            .get(&payment.id)
            .is_some_and(|p| p.status == expected_payment);
        let invoice_matches = store
            .invoices
            .get(&invoice.id)
            .is_some_and(|i| i.status == expected_invoice);
        if !payment_matches || !invoice_matches {
            return Ok(false);
        }

        store.payments.insert(payment.id, payment.clone());
        store.invoices.insert(invoice.id, invoice.clone());
        Ok(true)
    }

    async fn create_archive(&self, input: CreateArchive) -> Result<GatewayArchive, AppError> {
        let archive = GatewayArchive::record(input);
        self.store.lock().await.archives.push(archive.clone());
        Ok(archive)
    }

    async fn list_archives_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<GatewayArchive>, AppError> {
        Ok(self
            .store
            .lock()
            .await
            .archives
            .iter()
            .filter(|a| a.payment_id == Some(payment_id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Appointment directory stub
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StubAppointments {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl StubAppointments {
    pub async fn insert(&self, appointment: Appointment) {
        self.appointments
            .lock()
            .await
            .insert(appointment.id, appointment);
    }
}

#[async_trait]
impl AppointmentDirectory for StubAppointments {
    async fn find_completed_appointment(&self, id: Uuid) -> Result<Option<Appointment>, AppError> {
        Ok(self.appointments.lock().await.get(&id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Scripted gateway fake
// ---------------------------------------------------------------------------

/// Gateway double. Verification convention: a payload is considered
/// signed when `secureHash` equals `"good"`; `vnp_ResponseCode`
/// `"00"` means success, anything else failure.
pub struct FakeGateway {
    pub fail_next_url: AtomicBool,
    pub refund_code: Mutex<String>,
    pub query_response: Mutex<Option<TransactionQuery>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            fail_next_url: AtomicBool::new(false),
            refund_code: Mutex::new("00".to_string()),
            query_response: Mutex::new(None),
        }
    }
}

impl FakeGateway {
    fn verify(&self, params: &HashMap<String, String>) -> CallbackVerification {
        let raw_data = serde_json::to_value(params).unwrap_or(serde_json::Value::Null);

        if params.get("secureHash").map(String::as_str) != Some("good") {
            return CallbackVerification::invalid("invalid secure hash", raw_data);
        }

        let code = params
            .get("vnp_ResponseCode")
            .map(String::as_str)
            .unwrap_or("99");
        CallbackVerification {
            is_valid: true,
            order_ref: params.get("vnp_TxnRef").cloned(),
            transaction_id: params.get("vnp_TransactionNo").cloned(),
            amount: params
                .get("vnp_Amount")
                .and_then(|a| a.parse::<i64>().ok())
                .map(money::from_minor_units),
            status: if code == "00" {
                CallbackStatus::Success
            } else {
                CallbackStatus::Failed
            },
            message: format!("gateway code {}", code),
            pay_date: None,
            raw_data,
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn gateway_name(&self) -> &'static str {
        "vnpay"
    }

    fn generate_payment_url(&self, request: &PaymentUrlRequest) -> Result<PaymentUrl, GatewayError> {
        if self.fail_next_url.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        Ok(PaymentUrl {
            payment_url: format!("https://gateway.test/pay?ref={}", request.order_ref),
            order_ref: request.order_ref.clone(),
        })
    }

    fn verify_callback(&self, params: &HashMap<String, String>) -> CallbackVerification {
        self.verify(params)
    }

    fn verify_ipn(&self, params: &HashMap<String, String>) -> CallbackVerification {
        self.verify(params)
    }

    async fn initiate_refund(&self, request: &RefundRequest) -> Result<RefundOutcome, GatewayError> {
        let code = self.refund_code.lock().await.clone();
        Ok(RefundOutcome {
            success: code == "00",
            refund_transaction_id: Some(format!("refund-{}", request.order_ref)),
            response_code: code.clone(),
            message: format!("gateway code {}", code),
            raw_data: serde_json::json!({
                "vnp_ResponseCode": code,
                "vnp_TxnRef": request.order_ref,
            }),
        })
    }

    async fn query_transaction(
        &self,
        order_ref: &str,
        _transaction_date: DateTime<Utc>,
    ) -> Result<TransactionQuery, GatewayError> {
        match self.query_response.lock().await.take() {
            Some(query) => Ok(query),
            None => Ok(TransactionQuery {
                found: false,
                transaction_id: None,
                amount: None,
                status: CallbackStatus::Failed,
                message: "transaction not found".to_string(),
                raw_data: serde_json::json!({
                    "vnp_ResponseCode": "91",
                    "vnp_TxnRef": order_ref,
                }),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Recording notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    async fn record(&self, kind: &str, context: &PaymentEventContext) {
        self.events
            .lock()
            .await
            .push(format!("{}:{}", kind, context.payment_id));
    }

    pub async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl PaymentNotifier for RecordingNotifier {
    async fn payment_succeeded(&self, context: &PaymentEventContext) -> Result<(), AppError> {
        self.record("succeeded", context).await;
        Ok(())
    }

    async fn payment_failed(&self, context: &PaymentEventContext) -> Result<(), AppError> {
        self.record("failed", context).await;
        Ok(())
    }

    async fn payment_refunded(&self, context: &PaymentEventContext) -> Result<(), AppError> {
        self.record("refunded", context).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub repository: Arc<InMemoryRepository>,
    pub appointments: Arc<StubAppointments>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub orchestrator: BillingOrchestrator,
}

impl TestHarness {
    pub fn new() -> Self {
        Lazy::force(&TRACING);

        let repository = Arc::new(InMemoryRepository::default());
        let appointments = Arc::new(StubAppointments::default());
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let orchestrator = BillingOrchestrator::new(
            repository.clone(),
            appointments.clone(),
            gateway.clone(),
            notifier.clone(),
            OrchestratorSettings {
                tax_rate: Decimal::new(8, 2), // 8%
                return_url: "http://localhost:3000/payments/vnpay/return".to_string(),
                processing_expiry_minutes: 30,
            },
        );

        Self {
            repository,
            appointments,
            gateway,
            notifier,
            orchestrator,
        }
    }

    /// Seed one completed appointment and return its id.
    pub async fn seed_appointment(&self, subtotal: Decimal) -> Uuid {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            pet_name: "Buddy".to_string(),
            line_items: vec![ServiceLineItem {
                description: "General check-up".to_string(),
                unit_price: subtotal,
                quantity: 1,
            }],
        };
        let id = appointment.id;
        self.appointments.insert(appointment).await;
        id
    }

    /// Seed an appointment and generate its invoice.
    pub async fn seed_invoice(&self, subtotal: Decimal) -> Invoice {
        let appointment_id = self.seed_appointment(subtotal).await;
        self.orchestrator
            .generate_invoice(appointment_id)
            .await
            .expect("Failed to generate invoice")
    }

    /// Seed an invoice and open an online checkout, leaving the
    /// payment `Processing` and the invoice `ProcessingOnline`.
    pub async fn seed_processing_payment(&self, subtotal: Decimal) -> (Invoice, Payment) {
        let invoice = self.seed_invoice(subtotal).await;
        let (invoice, payment, _url) = self
            .orchestrator
            .initiate_online_payment(
                invoice.id,
                invoice.total_amount,
                PaymentMethod::Vnpay,
                format!("key-{}", Uuid::new_v4().simple()),
                "203.0.113.7".to_string(),
                None,
            )
            .await
            .expect("Failed to open online checkout");
        (invoice, payment)
    }

    /// Build a verified-success callback payload for a payment.
    pub fn success_params(&self, payment: &Payment) -> HashMap<String, String> {
        let mut params = self.verdict_params(payment, "00");
        params.insert("vnp_TransactionNo".to_string(), "14422345".to_string());
        params
    }

    /// Build a verified-failure callback payload for a payment.
    pub fn failure_params(&self, payment: &Payment, code: &str) -> HashMap<String, String> {
        self.verdict_params(payment, code)
    }

    fn verdict_params(&self, payment: &Payment, code: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("secureHash".to_string(), "good".to_string());
        params.insert("vnp_TxnRef".to_string(), payment.order_ref.clone());
        params.insert(
            "vnp_Amount".to_string(),
            money::to_minor_units(payment.amount)
                .expect("test amount converts")
                .to_string(),
        );
        params.insert("vnp_ResponseCode".to_string(), code.to_string());
        params
    }
}
