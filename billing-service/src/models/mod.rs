//! Domain models for billing-service.

mod appointment;
mod archive;
mod invoice;
mod payment;

pub mod money;

pub use appointment::{Appointment, ServiceLineItem};
pub use archive::{CreateArchive, GatewayArchive};
pub use invoice::{Invoice, InvoiceStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
