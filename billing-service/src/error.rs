//! Domain error taxonomy for the billing subsystem.

use clinic_core::error::AppError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the invoice/payment state machines and the
/// payment orchestrator.
///
/// Guard violations carry the attempted action together with the
/// current and expected states so callers can correct themselves;
/// they are never silently swallowed.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("invalid {entity} transition: {action} requires status {expected}, current status is {current}")]
    InvalidStateTransition {
        entity: &'static str,
        action: &'static str,
        current: &'static str,
        expected: &'static str,
    },

    #[error("invalid refund amount {requested}: must be positive and at most {paid}")]
    InvalidRefundAmount { requested: Decimal, paid: Decimal },

    #[error("invalid monetary amount: {0}")]
    InvalidAmount(String),

    #[error("online payments require a non-empty idempotency key")]
    MissingIdempotencyKey,

    #[error("invoice {0} not found")]
    InvoiceNotFound(Uuid),

    #[error("payment {0} not found")]
    PaymentNotFound(String),

    #[error("appointment {0} not found")]
    AppointmentNotFound(Uuid),

    #[error("an invoice already exists for appointment {appointment_id}")]
    InvoiceAlreadyExists { appointment_id: Uuid },

    #[error("a pending or processing payment already exists for invoice {invoice_id} with idempotency key {idempotency_key}")]
    DuplicateIdempotencyKey {
        invoice_id: Uuid,
        idempotency_key: String,
    },

    #[error("gateway signature verification failed")]
    GatewaySignatureInvalid,

    #[error("gateway amount {received} does not match recorded payment amount {expected}")]
    GatewayAmountMismatch { expected: Decimal, received: Decimal },

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("gateway declined the refund: code {code}, {message}")]
    RefundDeclined { code: String, message: String },

    #[error(transparent)]
    Infrastructure(#[from] AppError),
}
