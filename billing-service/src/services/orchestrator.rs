//! Payment orchestrator.
//!
//! Coordinates the invoice and payment state machines with the
//! gateway, the archive and the notifier. All multi-entity flows run
//! through here so that the pairing rules hold: a settled payment
//! always settles its invoice in the same transaction, and every raw
//! gateway payload is archived before any state changes hands.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use clinic_core::error::AppError;

use crate::error::BillingError;
use crate::models::{
    CreateArchive, Invoice, InvoiceStatus, Payment, PaymentMethod, PaymentStatus,
};
use crate::services::gateway::{
    CallbackStatus, CallbackVerification, IpnResponse, PaymentGateway, PaymentUrl,
    PaymentUrlRequest, RefundRequest,
};
use crate::services::metrics;
use crate::services::notifications::{PaymentEventContext, PaymentNotifier};
use crate::services::repository::{AppointmentDirectory, BillingRepository};

/// Tunables the orchestrator reads from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Flat tax rate applied when generating an invoice.
    pub tax_rate: Decimal,
    /// Return URL handed to the gateway at checkout.
    pub return_url: String,
    /// Minutes before a verdict-less `Processing` payment may be
    /// expired during reconciliation.
    pub processing_expiry_minutes: i64,
}

/// Result of handling a verified return-URL callback.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub invoice: Invoice,
    pub payment: Payment,
    pub status: CallbackStatus,
    pub message: String,
}

/// Result of reconciling one stuck payment against the gateway.
#[derive(Debug, Clone)]
pub enum ReconciliationOutcome {
    /// The gateway knew the transaction; its verdict was applied.
    Resolved(CallbackOutcome),
    /// No gateway record and the payment outlived the expiry window.
    Expired { invoice: Invoice, payment: Payment },
    /// No gateway record yet; left untouched for a later pass.
    StillProcessing(Payment),
}

enum VerdictApplied {
    Applied(CallbackOutcome),
    /// The payment was already terminal-successful; nothing changed.
    AlreadySettled(CallbackOutcome),
}

pub struct BillingOrchestrator {
    repository: Arc<dyn BillingRepository>,
    appointments: Arc<dyn AppointmentDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn PaymentNotifier>,
    settings: OrchestratorSettings,
}

impl BillingOrchestrator {
    pub fn new(
        repository: Arc<dyn BillingRepository>,
        appointments: Arc<dyn AppointmentDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn PaymentNotifier>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            repository,
            appointments,
            gateway,
            notifier,
            settings,
        }
    }

    /// Generate the invoice for a completed appointment.
    ///
    /// One invoice per appointment; a second call is rejected, the
    /// first invoice stands.
    #[instrument(skip(self))]
    pub async fn generate_invoice(&self, appointment_id: Uuid) -> Result<Invoice, BillingError> {
        if let Some(existing) = self
            .repository
            .find_invoice_by_appointment(appointment_id)
            .await?
        {
            tracing::warn!(
                appointment_id = %appointment_id,
                invoice_number = %existing.invoice_number,
                "invoice generation rejected, appointment already invoiced"
            );
            return Err(BillingError::InvoiceAlreadyExists { appointment_id });
        }

        let appointment = self
            .appointments
            .find_completed_appointment(appointment_id)
            .await?
            .ok_or(BillingError::AppointmentNotFound(appointment_id))?;

        let subtotal = appointment.subtotal();
        let tax = (subtotal * self.settings.tax_rate).round_dp(2);
        let invoice = Invoice::create(appointment_id, next_invoice_number(), subtotal, tax)?;

        self.repository.create_invoice(&invoice).await?;

        metrics::INVOICES_TOTAL
            .with_label_values(&[invoice.status.as_str()])
            .inc();
        tracing::info!(
            invoice_number = %invoice.invoice_number,
            appointment_id = %appointment_id,
            total = %invoice.total_amount,
            "invoice generated"
        );
        Ok(invoice)
    }

    /// Settle a pending invoice in full with cash taken at the front
    /// desk.
    #[instrument(skip(self, notes))]
    pub async fn record_cash_payment(
        &self,
        invoice_id: Uuid,
        received_by: Uuid,
        notes: Option<String>,
    ) -> Result<(Invoice, Payment), BillingError> {
        let mut invoice = self.find_invoice(invoice_id).await?;

        // Guard before creating the payment row so a settled invoice
        // never accretes stray pending attempts.
        if invoice.status != InvoiceStatus::Pending {
            return Err(BillingError::InvalidStateTransition {
                entity: "invoice",
                action: "pay_by_cash",
                current: invoice.status.as_str(),
                expected: "pending",
            });
        }

        let mut payment = Payment::new_cash(invoice.id, invoice.total_amount, received_by)?;
        payment.notes = notes;
        self.repository.create_payment(&payment).await?;

        payment.process_cash()?;
        invoice.pay_by_cash()?;

        let updated = self
            .repository
            .update_payment_and_invoice(
                &payment,
                PaymentStatus::Pending,
                &invoice,
                InvoiceStatus::Pending,
            )
            .await?;
        if !updated {
            return Err(concurrent_update("invoice"));
        }

        self.observe_settlement(&payment);
        self.notify_success(&invoice, &payment).await;

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            payment_id = %payment.id,
            amount = %payment.amount,
            "cash payment recorded"
        );
        Ok((invoice, payment))
    }

    /// Open an online checkout for an invoice: create the payment
    /// attempt, obtain the gateway redirect, and move both state
    /// machines to their processing states.
    ///
    /// The pending payment is persisted before the gateway is asked
    /// for a URL; a gateway outage therefore leaves an auditable
    /// pending attempt and an untouched invoice.
    #[instrument(skip(self, idempotency_key))]
    pub async fn initiate_online_payment(
        &self,
        invoice_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        idempotency_key: String,
        client_ip: String,
        locale: Option<String>,
    ) -> Result<(Invoice, Payment, PaymentUrl), BillingError> {
        let mut invoice = self.find_invoice(invoice_id).await?;

        if !invoice.can_start_online_payment() {
            return Err(BillingError::InvalidStateTransition {
                entity: "invoice",
                action: "initiate_online_payment",
                current: invoice.status.as_str(),
                expected: "pending or failed",
            });
        }

        // Partial attempts are allowed, overcharging is not.
        if amount <= Decimal::ZERO || amount > invoice.total_amount {
            return Err(BillingError::InvalidAmount(format!(
                "online payment amount {} must be positive and at most the invoice total {}",
                amount, invoice.total_amount
            )));
        }

        if let Some(existing) = self
            .repository
            .find_active_payment_by_idempotency_key(invoice.id, &idempotency_key)
            .await?
        {
            tracing::warn!(
                invoice_id = %invoice.id,
                payment_id = %existing.id,
                "online payment rejected, idempotency key already in flight"
            );
            return Err(BillingError::DuplicateIdempotencyKey {
                invoice_id: invoice.id,
                idempotency_key,
            });
        }

        let mut payment = Payment::new_online(invoice.id, amount, method, idempotency_key)?;
        self.repository.create_payment(&payment).await?;

        let url = self.gateway.generate_payment_url(&PaymentUrlRequest {
            order_ref: payment.order_ref.clone(),
            amount: payment.amount,
            description: format!("Payment for invoice {}", invoice.invoice_number),
            return_url: self.settings.return_url.clone(),
            client_ip,
            locale,
        })?;

        let invoice_was = invoice.status;
        payment.start_online_payment()?;
        invoice.start_online_payment()?;

        let updated = self
            .repository
            .update_payment_and_invoice(&payment, PaymentStatus::Pending, &invoice, invoice_was)
            .await?;
        if !updated {
            return Err(concurrent_update("invoice"));
        }

        metrics::INVOICES_TOTAL
            .with_label_values(&[invoice.status.as_str()])
            .inc();
        tracing::info!(
            invoice_number = %invoice.invoice_number,
            payment_id = %payment.id,
            order_ref = %payment.order_ref,
            "online checkout opened"
        );
        Ok((invoice, payment, url))
    }

    /// Handle the synchronous return-URL callback after checkout.
    #[instrument(skip(self, params))]
    pub async fn handle_gateway_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<CallbackOutcome, BillingError> {
        let verdict = self.gateway.verify_callback(params);
        metrics::GATEWAY_CALLBACKS_TOTAL
            .with_label_values(&["return_url", callback_outcome_label(&verdict)])
            .inc();

        if !verdict.is_valid {
            self.archive_unmatched(params, &verdict).await;
            metrics::ERRORS_TOTAL
                .with_label_values(&["gateway_signature"])
                .inc();
            return Err(BillingError::GatewaySignatureInvalid);
        }

        let payment = match self.find_verdict_payment(&verdict).await {
            Ok(payment) => payment,
            Err(err) => {
                self.archive_unmatched(params, &verdict).await;
                return Err(err);
            }
        };

        match self.apply_gateway_verdict(payment, &verdict).await? {
            VerdictApplied::Applied(outcome) | VerdictApplied::AlreadySettled(outcome) => {
                Ok(outcome)
            }
        }
    }

    /// Handle the asynchronous instant payment notification.
    ///
    /// Never fails: the gateway retries until it receives an
    /// acknowledgement, so every path collapses to one of the
    /// documented response codes. Redelivery of a settled payment
    /// changes nothing but is still archived.
    #[instrument(skip(self, params))]
    pub async fn handle_ipn(&self, params: &HashMap<String, String>) -> IpnResponse {
        let verdict = self.gateway.verify_ipn(params);
        metrics::GATEWAY_CALLBACKS_TOTAL
            .with_label_values(&["ipn", callback_outcome_label(&verdict)])
            .inc();

        if !verdict.is_valid {
            self.archive_unmatched(params, &verdict).await;
            metrics::ERRORS_TOTAL
                .with_label_values(&["gateway_signature"])
                .inc();
            return IpnResponse::invalid_signature();
        }

        let payment = match self.find_verdict_payment(&verdict).await {
            Ok(payment) => payment,
            Err(BillingError::PaymentNotFound(order_ref)) => {
                tracing::warn!(order_ref = %order_ref, "IPN for unknown order reference");
                self.archive_unmatched(params, &verdict).await;
                return IpnResponse::order_not_found();
            }
            Err(err) => {
                tracing::error!(error = %err, "IPN payment lookup failed");
                self.archive_unmatched(params, &verdict).await;
                return IpnResponse::unknown_error();
            }
        };

        match self.apply_gateway_verdict(payment, &verdict).await {
            Ok(VerdictApplied::Applied(_)) => IpnResponse::confirmed(),
            Ok(VerdictApplied::AlreadySettled(_)) => IpnResponse::already_confirmed(),
            Err(BillingError::GatewayAmountMismatch { .. }) => IpnResponse::invalid_amount(),
            Err(BillingError::InvalidStateTransition { .. }) => {
                // Terminal payment, non-success redelivery. The order
                // is settled one way or the other; stop the retries.
                IpnResponse::already_confirmed()
            }
            Err(err) => {
                tracing::error!(error = %err, "IPN processing failed");
                metrics::ERRORS_TOTAL.with_label_values(&["ipn"]).inc();
                IpnResponse::unknown_error()
            }
        }
    }

    /// Refund part or all of a successful payment.
    ///
    /// Online refunds are cleared with the gateway before any local
    /// state changes; a declined refund leaves the payment settled.
    /// Cash refunds are handed back from the drawer and skip the
    /// gateway entirely.
    #[instrument(skip(self, reason))]
    pub async fn process_refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        reason: String,
        requested_by: String,
    ) -> Result<Payment, BillingError> {
        let mut payment = self
            .repository
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))?;

        if payment.status != PaymentStatus::Success {
            return Err(BillingError::InvalidStateTransition {
                entity: "payment",
                action: "refund",
                current: payment.status.as_str(),
                expected: "success",
            });
        }
        if amount <= Decimal::ZERO || amount > payment.amount {
            return Err(BillingError::InvalidRefundAmount {
                requested: amount,
                paid: payment.amount,
            });
        }

        if payment.payment_method.is_online() {
            let transaction_id = payment.transaction_id.clone().ok_or_else(|| {
                BillingError::GatewayUnavailable(format!(
                    "payment {} has no gateway transaction id to refund against",
                    payment.id
                ))
            })?;

            let outcome = self
                .gateway
                .initiate_refund(&RefundRequest {
                    order_ref: payment.order_ref.clone(),
                    transaction_id,
                    amount,
                    original_amount: payment.amount,
                    transaction_date: payment.paid_at.unwrap_or(payment.created_at),
                    reason: reason.clone(),
                    requested_by,
                })
                .await?;

            self.archive(CreateArchive {
                payment_id: Some(payment.id),
                gateway_name: self.gateway.gateway_name().to_string(),
                gateway_response: outcome.raw_data.clone(),
                transaction_timestamp: None,
            })
            .await;

            if !outcome.success {
                metrics::REFUNDS_TOTAL.with_label_values(&["declined"]).inc();
                return Err(BillingError::RefundDeclined {
                    code: outcome.response_code,
                    message: outcome.message,
                });
            }
        }

        payment.refund(amount, reason)?;

        let updated = self
            .repository
            .update_payment(&payment, PaymentStatus::Success)
            .await?;
        if !updated {
            return Err(concurrent_update("payment"));
        }

        metrics::REFUNDS_TOTAL.with_label_values(&["accepted"]).inc();
        metrics::PAYMENTS_TOTAL
            .with_label_values(&[payment.payment_method.as_str(), payment.status.as_str()])
            .inc();

        if let Ok(invoice) = self.find_invoice(payment.invoice_id).await {
            let mut context = event_context(&invoice, &payment);
            context.amount = payment.refund_amount.unwrap_or(amount);
            if let Err(err) = self.notifier.payment_refunded(&context).await {
                tracing::warn!(error = %err, payment_id = %payment.id, "refund notification failed");
            }
        }

        tracing::info!(
            payment_id = %payment.id,
            amount = %amount,
            "refund processed"
        );
        Ok(payment)
    }

    /// Reconcile one `Processing` payment whose gateway verdict never
    /// arrived, by asking the gateway directly.
    #[instrument(skip(self))]
    pub async fn reconcile_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<ReconciliationOutcome, BillingError> {
        let mut payment = self
            .repository
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))?;

        if payment.status != PaymentStatus::Processing {
            return Err(BillingError::InvalidStateTransition {
                entity: "payment",
                action: "reconcile",
                current: payment.status.as_str(),
                expected: "processing",
            });
        }

        let query = self
            .gateway
            .query_transaction(&payment.order_ref, payment.created_at)
            .await?;
        metrics::GATEWAY_CALLBACKS_TOTAL
            .with_label_values(&["query", if query.found { "found" } else { "not_found" }])
            .inc();

        if query.found {
            let verdict = CallbackVerification {
                is_valid: true,
                order_ref: Some(payment.order_ref.clone()),
                transaction_id: query.transaction_id,
                amount: query.amount,
                status: query.status,
                message: query.message,
                pay_date: None,
                raw_data: query.raw_data,
            };
            return match self.apply_gateway_verdict(payment, &verdict).await? {
                VerdictApplied::Applied(outcome) | VerdictApplied::AlreadySettled(outcome) => {
                    Ok(ReconciliationOutcome::Resolved(outcome))
                }
            };
        }

        self.archive(CreateArchive {
            payment_id: Some(payment.id),
            gateway_name: self.gateway.gateway_name().to_string(),
            gateway_response: query.raw_data,
            transaction_timestamp: None,
        })
        .await;

        let age = Utc::now() - payment.created_at;
        if age < Duration::minutes(self.settings.processing_expiry_minutes) {
            tracing::info!(
                payment_id = %payment.id,
                "gateway has no record yet, leaving payment in processing"
            );
            return Ok(ReconciliationOutcome::StillProcessing(payment));
        }

        let mut invoice = self.find_invoice(payment.invoice_id).await?;
        payment.mark_failed(serde_json::json!({
            "reconciliation": "expired",
            "message": "no gateway record within the expiry window"
        }))?;
        invoice.mark_failed()?;

        let updated = self
            .repository
            .update_payment_and_invoice(
                &payment,
                PaymentStatus::Processing,
                &invoice,
                InvoiceStatus::ProcessingOnline,
            )
            .await?;
        if !updated {
            return Err(concurrent_update("payment"));
        }

        metrics::PAYMENTS_TOTAL
            .with_label_values(&[payment.payment_method.as_str(), payment.status.as_str()])
            .inc();
        self.notify_failure(&invoice, &payment, "payment expired without a gateway verdict")
            .await;

        tracing::warn!(
            payment_id = %payment.id,
            invoice_number = %invoice.invoice_number,
            "processing payment expired during reconciliation"
        );
        Ok(ReconciliationOutcome::Expired { invoice, payment })
    }

    /// Apply a verified gateway verdict to a payment and its invoice.
    ///
    /// The raw payload is archived before anything else, in every
    /// branch. A redelivered success for an already settled payment is
    /// a no-op beyond that second archive entry.
    async fn apply_gateway_verdict(
        &self,
        mut payment: Payment,
        verdict: &CallbackVerification,
    ) -> Result<VerdictApplied, BillingError> {
        self.archive(CreateArchive {
            payment_id: Some(payment.id),
            gateway_name: self.gateway.gateway_name().to_string(),
            gateway_response: verdict.raw_data.clone(),
            transaction_timestamp: verdict.pay_date,
        })
        .await;

        if let Some(received) = verdict.amount {
            if received != payment.amount {
                metrics::ERRORS_TOTAL
                    .with_label_values(&["amount_mismatch"])
                    .inc();
                tracing::warn!(
                    payment_id = %payment.id,
                    expected = %payment.amount,
                    received = %received,
                    "gateway amount does not match recorded payment"
                );
                return Err(BillingError::GatewayAmountMismatch {
                    expected: payment.amount,
                    received,
                });
            }
        }

        let settled = matches!(
            payment.status,
            PaymentStatus::Success | PaymentStatus::Refunded
        );
        if settled && verdict.status == CallbackStatus::Success {
            let invoice = self.find_invoice(payment.invoice_id).await?;
            tracing::info!(
                payment_id = %payment.id,
                "success verdict redelivered for settled payment, no state change"
            );
            return Ok(VerdictApplied::AlreadySettled(CallbackOutcome {
                invoice,
                payment,
                status: CallbackStatus::Success,
                message: verdict.message.clone(),
            }));
        }

        if payment.status != PaymentStatus::Processing {
            return Err(BillingError::InvalidStateTransition {
                entity: "payment",
                action: "apply_gateway_verdict",
                current: payment.status.as_str(),
                expected: "processing",
            });
        }

        let mut invoice = self.find_invoice(payment.invoice_id).await?;

        match verdict.status {
            CallbackStatus::Success => {
                let transaction_id = verdict
                    .transaction_id
                    .clone()
                    .unwrap_or_else(|| payment.order_ref.clone());
                payment.mark_success(transaction_id, verdict.raw_data.clone())?;
                invoice.mark_paid()?;
            }
            CallbackStatus::Failed => {
                payment.mark_failed(verdict.raw_data.clone())?;
                invoice.mark_failed()?;
            }
        }

        let updated = self
            .repository
            .update_payment_and_invoice(
                &payment,
                PaymentStatus::Processing,
                &invoice,
                InvoiceStatus::ProcessingOnline,
            )
            .await?;
        if !updated {
            return Err(concurrent_update("payment"));
        }

        self.observe_settlement(&payment);
        match verdict.status {
            CallbackStatus::Success => self.notify_success(&invoice, &payment).await,
            CallbackStatus::Failed => {
                self.notify_failure(&invoice, &payment, &verdict.message).await
            }
        }

        tracing::info!(
            payment_id = %payment.id,
            invoice_number = %invoice.invoice_number,
            status = payment.status.as_str(),
            "gateway verdict applied"
        );
        Ok(VerdictApplied::Applied(CallbackOutcome {
            invoice,
            payment,
            status: verdict.status,
            message: verdict.message.clone(),
        }))
    }

    async fn find_invoice(&self, id: Uuid) -> Result<Invoice, BillingError> {
        self.repository
            .find_invoice(id)
            .await?
            .ok_or(BillingError::InvoiceNotFound(id))
    }

    async fn find_verdict_payment(
        &self,
        verdict: &CallbackVerification,
    ) -> Result<Payment, BillingError> {
        let order_ref = verdict
            .order_ref
            .clone()
            .ok_or_else(|| BillingError::PaymentNotFound("<missing order reference>".to_string()))?;
        self.repository
            .find_payment_by_order_ref(&order_ref)
            .await?
            .ok_or(BillingError::PaymentNotFound(order_ref))
    }

    /// Archive a payload that could not be applied to a payment
    /// (failed verification or unknown order), correlating it by raw
    /// order reference when possible.
    async fn archive_unmatched(
        &self,
        params: &HashMap<String, String>,
        verdict: &CallbackVerification,
    ) {
        let payment_id = match params.get("vnp_TxnRef") {
            Some(order_ref) => self
                .repository
                .find_payment_by_order_ref(order_ref)
                .await
                .ok()
                .flatten()
                .map(|p| p.id),
            None => None,
        };
        self.archive(CreateArchive {
            payment_id,
            gateway_name: self.gateway.gateway_name().to_string(),
            gateway_response: verdict.raw_data.clone(),
            transaction_timestamp: verdict.pay_date,
        })
        .await;
    }

    /// Archive failures are logged, never propagated: losing an audit
    /// copy must not lose a customer's payment.
    async fn archive(&self, input: CreateArchive) {
        if let Err(err) = self.repository.create_archive(input).await {
            tracing::error!(error = %err, "failed to archive gateway payload");
            metrics::ERRORS_TOTAL.with_label_values(&["archive"]).inc();
        }
    }

    fn observe_settlement(&self, payment: &Payment) {
        metrics::PAYMENTS_TOTAL
            .with_label_values(&[payment.payment_method.as_str(), payment.status.as_str()])
            .inc();
        if payment.status == PaymentStatus::Success {
            metrics::SETTLED_AMOUNT_TOTAL
                .with_label_values(&[payment.payment_method.as_str()])
                .inc_by(payment.amount.to_f64().unwrap_or(0.0));
        }
        metrics::INVOICES_TOTAL
            .with_label_values(&[match payment.status {
                PaymentStatus::Success => InvoiceStatus::Paid.as_str(),
                _ => InvoiceStatus::Failed.as_str(),
            }])
            .inc();
    }

    async fn notify_success(&self, invoice: &Invoice, payment: &Payment) {
        if let Err(err) = self
            .notifier
            .payment_succeeded(&event_context(invoice, payment))
            .await
        {
            tracing::warn!(error = %err, payment_id = %payment.id, "success notification failed");
        }
    }

    async fn notify_failure(&self, invoice: &Invoice, payment: &Payment, reason: &str) {
        let mut context = event_context(invoice, payment);
        context.failure_reason = Some(reason.to_string());
        if let Err(err) = self.notifier.payment_failed(&context).await {
            tracing::warn!(error = %err, payment_id = %payment.id, "failure notification failed");
        }
    }
}

fn event_context(invoice: &Invoice, payment: &Payment) -> PaymentEventContext {
    PaymentEventContext {
        invoice_id: invoice.id,
        appointment_id: invoice.appointment_id,
        invoice_number: invoice.invoice_number.clone(),
        payment_id: payment.id,
        amount: payment.amount,
        payment_method: payment.payment_method,
        occurred_at: payment.paid_at.unwrap_or_else(Utc::now),
        failure_reason: None,
    }
}

fn next_invoice_number() -> String {
    let fragment = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("INV-{}-{}", Utc::now().format("%Y%m%d"), fragment)
}

fn callback_outcome_label(verdict: &CallbackVerification) -> &'static str {
    if !verdict.is_valid {
        "invalid_signature"
    } else if verdict.status == CallbackStatus::Success {
        "success"
    } else {
        "failed"
    }
}

fn concurrent_update(entity: &str) -> BillingError {
    BillingError::Infrastructure(AppError::Conflict(anyhow::anyhow!(
        "{} was modified concurrently, retry the operation",
        entity
    )))
}
