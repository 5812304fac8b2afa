//! Gateway response archive.
//!
//! Every raw gateway payload the service receives or fetches is copied
//! into an append-only archive for audit and forensic review. Entries
//! are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable audit copy of one gateway interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayArchive {
    pub id: Uuid,
    /// Unset when the payload could not be correlated to a payment,
    /// e.g. a notification carrying an unknown order reference.
    pub payment_id: Option<Uuid>,
    pub gateway_name: String,
    pub gateway_response: serde_json::Value,
    pub transaction_timestamp: Option<DateTime<Utc>>,
    pub archived_at: DateTime<Utc>,
}

/// Input for archiving a gateway payload.
#[derive(Debug, Clone)]
pub struct CreateArchive {
    pub payment_id: Option<Uuid>,
    pub gateway_name: String,
    pub gateway_response: serde_json::Value,
    pub transaction_timestamp: Option<DateTime<Utc>>,
}

impl GatewayArchive {
    pub fn record(input: CreateArchive) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: input.payment_id,
            gateway_name: input.gateway_name,
            gateway_response: input.gateway_response,
            transaction_timestamp: input.transaction_timestamp,
            archived_at: Utc::now(),
        }
    }
}
