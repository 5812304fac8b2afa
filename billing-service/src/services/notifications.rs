//! Payment event notifications.
//!
//! Settlements and failures raise an event for the owner-facing
//! notification pipeline. Delivery is someone else's job; the
//! orchestrator fires and forgets, and a failed notification never
//! rolls back a settled payment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use clinic_core::error::AppError;

use crate::models::PaymentMethod;

/// Context handed to the notifier after a payment reaches a terminal
/// state. Recipient lookup happens downstream from the appointment id.
#[derive(Debug, Clone)]
pub struct PaymentEventContext {
    pub invoice_id: Uuid,
    pub appointment_id: Uuid,
    pub invoice_number: String,
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
    /// Set only for failure events.
    pub failure_reason: Option<String>,
}

#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn payment_succeeded(&self, context: &PaymentEventContext) -> Result<(), AppError>;

    async fn payment_failed(&self, context: &PaymentEventContext) -> Result<(), AppError>;

    async fn payment_refunded(&self, context: &PaymentEventContext) -> Result<(), AppError>;
}

/// Notifier that only writes structured log events, for deployments
/// without a notification pipeline attached.
pub struct LoggingNotifier;

#[async_trait]
impl PaymentNotifier for LoggingNotifier {
    async fn payment_succeeded(&self, context: &PaymentEventContext) -> Result<(), AppError> {
        tracing::info!(
            invoice_number = %context.invoice_number,
            payment_id = %context.payment_id,
            amount = %context.amount,
            method = context.payment_method.as_str(),
            "payment succeeded"
        );
        Ok(())
    }

    async fn payment_failed(&self, context: &PaymentEventContext) -> Result<(), AppError> {
        tracing::warn!(
            invoice_number = %context.invoice_number,
            payment_id = %context.payment_id,
            reason = context.failure_reason.as_deref().unwrap_or("unknown"),
            "payment failed"
        );
        Ok(())
    }

    async fn payment_refunded(&self, context: &PaymentEventContext) -> Result<(), AppError> {
        tracing::info!(
            invoice_number = %context.invoice_number,
            payment_id = %context.payment_id,
            amount = %context.amount,
            "payment refunded"
        );
        Ok(())
    }
}
