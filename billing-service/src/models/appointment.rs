//! Read-only appointment view.
//!
//! Appointments belong to the scheduling module; billing only consumes
//! this projection to price an invoice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One billable service performed during an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLineItem {
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl ServiceLineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Completed appointment as served by the scheduling module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub pet_name: String,
    pub line_items: Vec<ServiceLineItem>,
}

impl Appointment {
    /// Sum of all service line totals.
    pub fn subtotal(&self) -> Decimal {
        self.line_items.iter().map(ServiceLineItem::line_total).sum()
    }
}
