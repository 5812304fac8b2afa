//! Invoice state machine.
//!
//! An invoice is the financial record for one completed appointment.
//! It is created `Pending`, settles to `Paid` either directly (cash at
//! the front desk) or through `ProcessingOnline` (gateway checkout),
//! and is never deleted. All mutation goes through guarded methods
//! that re-check the total invariant.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BillingError;
use crate::models::money;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    ProcessingOnline,
    Paid,
    Failed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::ProcessingOnline => "processing_online",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "processing_online" => InvoiceStatus::ProcessingOnline,
            "paid" => InvoiceStatus::Paid,
            "failed" => InvoiceStatus::Failed,
            _ => InvoiceStatus::Pending,
        }
    }
}

/// Invoice for one appointment's charges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a fresh `Pending` invoice for an appointment.
    pub fn create(
        appointment_id: Uuid,
        invoice_number: String,
        subtotal: Decimal,
        tax: Decimal,
    ) -> Result<Self, BillingError> {
        let total_amount = money::invoice_total(subtotal, Decimal::ZERO, tax)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            appointment_id,
            invoice_number,
            status: InvoiceStatus::Pending,
            issue_date: now.date_naive(),
            subtotal,
            discount: Decimal::ZERO,
            tax,
            total_amount,
            notes: None,
            paid_at: None,
            created_at: now,
        })
    }

    /// Rebuild an invoice from persisted state without re-running
    /// creation rules.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: Uuid,
        appointment_id: Uuid,
        invoice_number: String,
        status: InvoiceStatus,
        issue_date: NaiveDate,
        subtotal: Decimal,
        discount: Decimal,
        tax: Decimal,
        total_amount: Decimal,
        notes: Option<String>,
        paid_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            appointment_id,
            invoice_number,
            status,
            issue_date,
            subtotal,
            discount,
            tax,
            total_amount,
            notes,
            paid_at,
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
                entity: "invoice",
                action,
                current: self.status.as_str(),
                expected,
            })
        }
    }

    /// Settle the invoice in full with cash at the front desk.
    pub fn pay_by_cash(&mut self) -> Result<(), BillingError> {
        self.guard("pay_by_cash", "pending", self.status == InvoiceStatus::Pending)?;
        self.status = InvoiceStatus::Paid;
        self.paid_at = Some(Utc::now());
        Ok(())
    }

    /// Whether an online checkout may be started.
    ///
    /// A failed online attempt does not strand the invoice: `Failed`
    /// invoices may retry checkout.
    pub fn can_start_online_payment(&self) -> bool {
        matches!(self.status, InvoiceStatus::Pending | InvoiceStatus::Failed)
    }

    pub fn start_online_payment(&mut self) -> Result<(), BillingError> {
        self.guard(
            "start_online_payment",
            "pending or failed",
            self.can_start_online_payment(),
        )?;
        self.status = InvoiceStatus::ProcessingOnline;
        Ok(())
    }

    pub fn mark_paid(&mut self) -> Result<(), BillingError> {
        self.guard(
            "mark_paid",
            "processing_online",
            self.status == InvoiceStatus::ProcessingOnline,
        )?;
        self.status = InvoiceStatus::Paid;
        if self.paid_at.is_none() {
            self.paid_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), BillingError> {
        self.guard(
            "mark_failed",
            "processing_online",
            self.status == InvoiceStatus::ProcessingOnline,
        )?;
        self.status = InvoiceStatus::Failed;
        Ok(())
    }

    /// Apply a discount to a pending invoice and recompute the total.
    pub fn apply_discount(&mut self, amount: Decimal) -> Result<(), BillingError> {
        self.guard(
            "apply_discount",
            "pending",
            self.status == InvoiceStatus::Pending,
        )?;
        money::ensure_non_negative("discount", amount)?;

        let total_amount = money::invoice_total(self.subtotal, amount, self.tax)?;
        self.discount = amount;
        self.total_amount = total_amount;
        Ok(())
    }

    /// Update free-form notes. Paid invoices are frozen financial
    /// records and reject this.
    pub fn update_notes(&mut self, notes: impl Into<String>) -> Result<(), BillingError> {
        self.guard(
            "update_notes",
            "any status except paid",
            self.status != InvoiceStatus::Paid,
        )?;
        self.notes = Some(notes.into());
        Ok(())
    }
}
