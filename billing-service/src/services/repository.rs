//! Persistence ports for the billing subsystem.
//!
//! The orchestrator depends on these traits; the Postgres
//! implementation lives in [`super::database`] and tests substitute
//! in-memory doubles.

use async_trait::async_trait;
use uuid::Uuid;

use clinic_core::error::AppError;

use crate::models::{Appointment, CreateArchive, GatewayArchive, Invoice, InvoiceStatus, Payment, PaymentStatus};

/// Storage for invoices, payments and the gateway archive.
///
/// Guarded updates take the status the caller last observed and return
/// `false` when the row has since moved on, so concurrent writers
/// cannot silently clobber a settlement. The combined methods apply a
/// settlement or gateway verdict to both entities in one transaction.
#[async_trait]
pub trait BillingRepository: Send + Sync {
    async fn create_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError>;

    async fn find_invoice_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>;

    /// Persist `invoice` only if the stored row still has status
    /// `expected`. Returns whether the write landed.
    async fn update_invoice(
        &self,
        invoice: &Invoice,
        expected: InvoiceStatus,
    ) -> Result<bool, AppError>;

    async fn create_payment(&self, payment: &Payment) -> Result<(), AppError>;

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError>;

    async fn find_payment_by_order_ref(&self, order_ref: &str) -> Result<Option<Payment>, AppError>;

    /// Find a live (pending or processing) payment for this invoice
    /// carrying this idempotency key.
    async fn find_active_payment_by_idempotency_key(
        &self,
        invoice_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, AppError>;

    /// Guarded payment update, same contract as [`Self::update_invoice`].
    async fn update_payment(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
    ) -> Result<bool, AppError>;

    /// Atomically persist a payment transition together with its
    /// invoice transition. Both guarded writes must land or neither
    /// does.
    async fn update_payment_and_invoice(
        &self,
        payment: &Payment,
        expected_payment: PaymentStatus,
        invoice: &Invoice,
        expected_invoice: InvoiceStatus,
    ) -> Result<bool, AppError>;

    async fn create_archive(&self, input: CreateArchive) -> Result<GatewayArchive, AppError>;

    async fn list_archives_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<GatewayArchive>, AppError>;
}

/// Read-only access to the scheduling module's appointments.
#[async_trait]
pub trait AppointmentDirectory: Send + Sync {
    async fn find_completed_appointment(&self, id: Uuid) -> Result<Option<Appointment>, AppError>;
}
