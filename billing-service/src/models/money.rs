//! Monetary amount helpers.
//!
//! All money is `rust_decimal::Decimal`; floats never touch a balance.
//! The gateway wire format carries amounts in minor units (the decimal
//! amount multiplied by 100), so conversions must be exact.

use crate::error::BillingError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Scale factor between decimal amounts and gateway wire amounts.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Reject negative amounts with the offending field named.
pub fn ensure_non_negative(field: &'static str, amount: Decimal) -> Result<(), BillingError> {
    if amount.is_sign_negative() {
        return Err(BillingError::InvalidAmount(format!(
            "{} must not be negative, got {}",
            field, amount
        )));
    }
    Ok(())
}

/// Reject non-positive amounts with the offending field named.
pub fn ensure_positive(field: &'static str, amount: Decimal) -> Result<(), BillingError> {
    if amount <= Decimal::ZERO {
        return Err(BillingError::InvalidAmount(format!(
            "{} must be positive, got {}",
            field, amount
        )));
    }
    Ok(())
}

/// Compute an invoice total, enforcing `total = subtotal - discount + tax`
/// with every component and the result non-negative.
pub fn invoice_total(
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
) -> Result<Decimal, BillingError> {
    ensure_non_negative("subtotal", subtotal)?;
    ensure_non_negative("discount", discount)?;
    ensure_non_negative("tax", tax)?;

    let total = subtotal - discount + tax;
    if total.is_sign_negative() {
        return Err(BillingError::InvalidAmount(format!(
            "discount {} exceeds subtotal {} plus tax {}",
            discount, subtotal, tax
        )));
    }
    Ok(total)
}

/// Convert a decimal amount to gateway minor units (amount x 100).
///
/// Fails if the amount carries more precision than the wire format can
/// represent, or overflows an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, BillingError> {
    let scaled = amount * Decimal::from(10i64.pow(MINOR_UNIT_SCALE));
    if !scaled.is_integer() {
        return Err(BillingError::InvalidAmount(format!(
            "amount {} has sub-minor-unit precision",
            amount
        )));
    }
    scaled.to_i64().ok_or_else(|| {
        BillingError::InvalidAmount(format!("amount {} overflows the gateway wire format", amount))
    })
}

/// Convert a gateway minor-unit amount back to a decimal amount.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE).normalize()
}
