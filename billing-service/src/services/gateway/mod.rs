//! Payment gateway port.
//!
//! Abstract capability over an external payment processor: building a
//! hosted-checkout redirect, verifying return-URL and IPN payloads,
//! refunding and querying transactions. The orchestrator only ever
//! talks to this trait; one implementation exists per processor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::BillingError;

pub mod vnpay;

pub use vnpay::VnpayGateway;

/// Request to build a hosted-checkout redirect URL.
#[derive(Debug, Clone)]
pub struct PaymentUrlRequest {
    /// Merchant-side order reference, unique per payment attempt.
    pub order_ref: String,
    pub amount: Decimal,
    pub description: String,
    pub return_url: String,
    pub client_ip: String,
    /// Checkout page locale; gateway default when unset.
    pub locale: Option<String>,
}

/// Signed redirect handed back to the customer.
#[derive(Debug, Clone)]
pub struct PaymentUrl {
    pub payment_url: String,
    pub order_ref: String,
}

/// Outcome reported by a verified gateway payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Success,
    Failed,
}

/// Verdict from verifying a return-URL or IPN parameter set.
///
/// Malformed or unsigned input never raises an error; it comes back
/// with `is_valid == false` so the caller can archive and reject it.
#[derive(Debug, Clone)]
pub struct CallbackVerification {
    pub is_valid: bool,
    pub order_ref: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Option<Decimal>,
    pub status: CallbackStatus,
    pub message: String,
    pub pay_date: Option<DateTime<Utc>>,
    pub raw_data: serde_json::Value,
}

impl CallbackVerification {
    /// Verdict for a payload that failed signature or shape checks.
    pub fn invalid(message: impl Into<String>, raw_data: serde_json::Value) -> Self {
        Self {
            is_valid: false,
            order_ref: None,
            transaction_id: None,
            amount: None,
            status: CallbackStatus::Failed,
            message: message.into(),
            pay_date: None,
            raw_data,
        }
    }
}

/// Request to refund a settled gateway transaction.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_ref: String,
    pub transaction_id: String,
    pub amount: Decimal,
    /// Original settled amount, used to distinguish full from partial
    /// refunds on the wire.
    pub original_amount: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub reason: String,
    pub requested_by: String,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub success: bool,
    pub refund_transaction_id: Option<String>,
    pub response_code: String,
    pub message: String,
    pub raw_data: serde_json::Value,
}

/// Result of a reconciliation query for a lost callback/IPN.
#[derive(Debug, Clone)]
pub struct TransactionQuery {
    pub found: bool,
    pub transaction_id: Option<String>,
    pub amount: Option<Decimal>,
    pub status: CallbackStatus,
    pub message: String,
    pub raw_data: serde_json::Value,
}

/// Errors at the gateway transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unavailable(String),

    #[error("gateway protocol error: {0}")]
    Protocol(String),
}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        BillingError::GatewayUnavailable(err.to_string())
    }
}

/// IPN acknowledgement, dictated by the gateway wire contract.
///
/// The code set is closed; the gateway retries delivery until it
/// receives one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnResponse {
    pub const fn confirmed() -> Self {
        Self { rsp_code: "00", message: "Confirm Success" }
    }

    pub const fn order_not_found() -> Self {
        Self { rsp_code: "01", message: "Order not Found" }
    }

    pub const fn already_confirmed() -> Self {
        Self { rsp_code: "02", message: "Order already confirmed" }
    }

    pub const fn invalid_amount() -> Self {
        Self { rsp_code: "04", message: "Invalid Amount" }
    }

    pub const fn invalid_signature() -> Self {
        Self { rsp_code: "97", message: "Invalid Checksum" }
    }

    pub const fn unknown_error() -> Self {
        Self { rsp_code: "99", message: "Unknown error" }
    }
}

/// Abstract payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn gateway_name(&self) -> &'static str;

    /// Build a signed redirect URL. Pure; must not mutate any entity.
    fn generate_payment_url(&self, request: &PaymentUrlRequest) -> Result<PaymentUrl, GatewayError>;

    /// Verify a synchronous return-URL parameter set.
    fn verify_callback(&self, params: &HashMap<String, String>) -> CallbackVerification;

    /// Verify an asynchronous IPN parameter set. Verification itself is
    /// idempotent; the caller guards against double-applying effects.
    fn verify_ipn(&self, params: &HashMap<String, String>) -> CallbackVerification;

    async fn initiate_refund(&self, request: &RefundRequest) -> Result<RefundOutcome, GatewayError>;

    async fn query_transaction(
        &self,
        order_ref: &str,
        transaction_date: DateTime<Utc>,
    ) -> Result<TransactionQuery, GatewayError>;
}
