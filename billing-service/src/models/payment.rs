//! Payment state machine.
//!
//! A payment is one attempt to settle an invoice. Cash settles
//! immediately; online attempts pass through `Processing` while the
//! gateway holds the customer. A successful payment may later be
//! refunded, partially or in full, exactly once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BillingError;
use crate::models::money;

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Vnpay,
    Momo,
    Zalopay,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Vnpay => "vnpay",
            PaymentMethod::Momo => "momo",
            PaymentMethod::Zalopay => "zalopay",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "vnpay" => PaymentMethod::Vnpay,
            "momo" => PaymentMethod::Momo,
            "zalopay" => PaymentMethod::Zalopay,
            "bank_transfer" => PaymentMethod::BankTransfer,
            _ => PaymentMethod::Cash,
        }
    }

    /// Anything that goes through a gateway rather than the cash drawer.
    pub fn is_online(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "processing" => PaymentStatus::Processing,
            "success" => PaymentStatus::Success,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }
}

/// One settlement attempt against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    /// Reference sent to the gateway as the order id (vnp_TxnRef).
    pub order_ref: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    /// Fixed at creation; a different amount means a different payment.
    pub amount: Decimal,
    /// External gateway transaction id, set only by `mark_success`.
    pub transaction_id: Option<String>,
    /// Required and unique per invoice for online payments, absent for cash.
    pub idempotency_key: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Staff member who took the cash, cash only.
    pub received_by: Option<Uuid>,
    pub gateway_response: Option<serde_json::Value>,
    pub refund_amount: Option<Decimal>,
    pub refund_date: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Create a pending cash payment taken by a staff member.
    pub fn new_cash(
        invoice_id: Uuid,
        amount: Decimal,
        received_by: Uuid,
    ) -> Result<Self, BillingError> {
        money::ensure_positive("payment amount", amount)?;
        Ok(Self::pending(
            invoice_id,
            PaymentMethod::Cash,
            amount,
            None,
            Some(received_by),
        ))
    }

    /// Create a pending online payment with its caller-supplied
    /// idempotency key.
    pub fn new_online(
        invoice_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        idempotency_key: String,
    ) -> Result<Self, BillingError> {
        money::ensure_positive("payment amount", amount)?;
        if !method.is_online() {
            return Err(BillingError::InvalidStateTransition {
                entity: "payment",
                action: "new_online",
                current: method.as_str(),
                expected: "an online payment method",
            });
        }
        if idempotency_key.trim().is_empty() {
            return Err(BillingError::MissingIdempotencyKey);
        }
        Ok(Self::pending(
            invoice_id,
            method,
            amount,
            Some(idempotency_key),
            None,
        ))
    }

    fn pending(
        invoice_id: Uuid,
        method: PaymentMethod,
        amount: Decimal,
        idempotency_key: Option<String>,
        received_by: Option<Uuid>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            invoice_id,
            order_ref: id.simple().to_string(),
            payment_method: method,
            status: PaymentStatus::Pending,
            amount,
            transaction_id: None,
            idempotency_key,
            paid_at: None,
            received_by,
            gateway_response: None,
            refund_amount: None,
            refund_date: None,
            refund_reason: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// Rebuild a payment from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: Uuid,
        invoice_id: Uuid,
        order_ref: String,
        payment_method: PaymentMethod,
        status: PaymentStatus,
        amount: Decimal,
        transaction_id: Option<String>,
        idempotency_key: Option<String>,
        paid_at: Option<DateTime<Utc>>,
        received_by: Option<Uuid>,
        gateway_response: Option<serde_json::Value>,
        refund_amount: Option<Decimal>,
        refund_date: Option<DateTime<Utc>>,
        refund_reason: Option<String>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            invoice_id,
            order_ref,
            payment_method,
            status,
            amount,
            transaction_id,
            idempotency_key,
            paid_at,
            received_by,
            gateway_response,
            refund_amount,
            refund_date,
            refund_reason,
            notes,
            created_at,
        }
    }

    fn guard(
        &self,
        action: &'static str,
        expected: &'static str,
        ok: bool,
    ) -> Result<(), BillingError> {
        if ok {
            Ok(())
        } else {
            Err(BillingError::InvalidStateTransition {
                entity: "payment",
                action,
                current: self.status.as_str(),
                expected,
            })
        }
    }

    /// Settle a pending cash payment. Cash never passes through
    /// `Processing`.
    pub fn process_cash(&mut self) -> Result<(), BillingError> {
        self.guard(
            "process_cash",
            "pending with cash method",
            self.payment_method == PaymentMethod::Cash && self.status == PaymentStatus::Pending,
        )?;
        self.status = PaymentStatus::Success;
        self.paid_at = Some(Utc::now());
        Ok(())
    }

    /// Move a pending online payment to `Processing` once the customer
    /// has been handed the checkout redirect.
    pub fn start_online_payment(&mut self) -> Result<(), BillingError> {
        self.guard(
            "start_online_payment",
            "pending with an online method",
            self.payment_method.is_online() && self.status == PaymentStatus::Pending,
        )?;
        self.status = PaymentStatus::Processing;
        Ok(())
    }

    /// Apply a verified successful gateway verdict. The only path that
    /// sets `transaction_id`.
    pub fn mark_success(
        &mut self,
        transaction_id: String,
        gateway_response: serde_json::Value,
    ) -> Result<(), BillingError> {
        self.guard(
            "mark_success",
            "processing",
            self.status == PaymentStatus::Processing,
        )?;
        self.status = PaymentStatus::Success;
        self.transaction_id = Some(transaction_id);
        self.gateway_response = Some(gateway_response);
        self.paid_at = Some(Utc::now());
        Ok(())
    }

    /// Apply a verified failed gateway verdict. `transaction_id`
    /// remains unset.
    pub fn mark_failed(&mut self, gateway_response: serde_json::Value) -> Result<(), BillingError> {
        self.guard(
            "mark_failed",
            "processing",
            self.status == PaymentStatus::Processing,
        )?;
        self.status = PaymentStatus::Failed;
        self.gateway_response = Some(gateway_response);
        Ok(())
    }

    /// Refund part or all of a successful payment.
    pub fn refund(&mut self, amount: Decimal, reason: String) -> Result<(), BillingError> {
        self.guard("refund", "success", self.status == PaymentStatus::Success)?;
        if amount <= Decimal::ZERO || amount > self.amount {
            return Err(BillingError::InvalidRefundAmount {
                requested: amount,
                paid: self.amount,
            });
        }
        self.status = PaymentStatus::Refunded;
        self.refund_amount = Some(amount);
        self.refund_date = Some(Utc::now());
        self.refund_reason = Some(reason);
        Ok(())
    }
}
