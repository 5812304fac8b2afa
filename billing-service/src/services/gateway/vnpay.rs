//! VNPay gateway adapter.
//!
//! Implements VNPay's hosted checkout (vpcpay), return-URL and IPN
//! verification, and the merchant API for refunds and transaction
//! queries. Every outbound request and inbound payload is signed with
//! HMAC-SHA512 over the gateway's canonical parameter encoding.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;
use uuid::Uuid;

use clinic_core::utils::signature::{hmac_sha512_hex, verify_hmac_sha512_hex};

use crate::config::VnpayConfig;
use crate::models::money;

use super::{
    CallbackStatus, CallbackVerification, GatewayError, PaymentGateway, PaymentUrl,
    PaymentUrlRequest, RefundOutcome, RefundRequest, TransactionQuery,
};

pub const GATEWAY_NAME: &str = "vnpay";

const VNP_VERSION: &str = "2.1.0";
const SERVER_IP: &str = "127.0.0.1";

/// Map a VNPay transaction response code to its documented meaning.
///
/// Distinguishable failure reasons must stay distinguishable; callers
/// surface these messages rather than a bare success flag.
pub fn response_message(code: &str) -> &'static str {
    match code {
        "00" => "Transaction successful",
        "07" => "Money deducted, transaction suspected of fraud",
        "09" => "Card or account not registered for online banking",
        "10" => "Card or account verification failed more than 3 times",
        "11" => "Payment window expired",
        "12" => "Card or account is locked",
        "13" => "Wrong one-time password",
        "24" => "Customer cancelled the transaction",
        "51" => "Insufficient funds",
        "65" => "Daily transaction limit exceeded",
        "75" => "Issuing bank under maintenance",
        "79" => "Wrong payment password entered too many times",
        _ => "Other error",
    }
}

#[derive(Clone)]
pub struct VnpayGateway {
    client: Client,
    config: VnpayConfig,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// VNPay clock: all wire timestamps are Indochina time (UTC+7).
    fn gateway_time(at: DateTime<Utc>) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(7 * 3600).expect("static UTC+7 offset");
        at.with_timezone(&offset)
    }

    fn format_wire_timestamp(at: DateTime<Utc>) -> String {
        Self::gateway_time(at).format("%Y%m%d%H%M%S").to_string()
    }

    fn parse_wire_timestamp(s: &str) -> Option<DateTime<Utc>> {
        let offset = FixedOffset::east_opt(7 * 3600)?;
        let naive = NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S").ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Canonical hash input: parameters sorted by name, empty values
    /// dropped, values URL-encoded, joined with `&`.
    fn hash_data(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign(&self, payload: &str) -> Result<String, GatewayError> {
        hmac_sha512_hex(self.config.hash_secret.expose_secret(), payload)
            .map_err(|e| GatewayError::Protocol(e.to_string()))
    }

    /// Shared verification for return-URL and IPN parameter sets.
    fn verify_params(&self, params: &HashMap<String, String>) -> CallbackVerification {
        let raw_data = serde_json::to_value(params).unwrap_or(serde_json::Value::Null);

        let Some(secure_hash) = params.get("vnp_SecureHash") else {
            return CallbackVerification::invalid("missing secure hash", raw_data);
        };

        let signed: BTreeMap<String, String> = params
            .iter()
            .filter(|(k, _)| {
                k.starts_with("vnp_") && *k != "vnp_SecureHash" && *k != "vnp_SecureHashType"
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let payload = Self::hash_data(&signed);
        let valid = verify_hmac_sha512_hex(
            self.config.hash_secret.expose_secret(),
            &payload,
            secure_hash,
        )
        .unwrap_or(false);

        if !valid {
            tracing::warn!(gateway = GATEWAY_NAME, "gateway signature verification failed");
            return CallbackVerification::invalid("invalid secure hash", raw_data);
        }

        let order_ref = params.get("vnp_TxnRef").cloned();
        let transaction_id = params.get("vnp_TransactionNo").cloned();
        let amount = params
            .get("vnp_Amount")
            .and_then(|a| a.parse::<i64>().ok())
            .map(money::from_minor_units);
        let pay_date = params
            .get("vnp_PayDate")
            .and_then(|d| Self::parse_wire_timestamp(d));

        let response_code = params.get("vnp_ResponseCode").map(String::as_str).unwrap_or("99");
        let transaction_status = params
            .get("vnp_TransactionStatus")
            .map(String::as_str)
            .unwrap_or("00");

        let status = if response_code == "00" && transaction_status == "00" {
            CallbackStatus::Success
        } else {
            CallbackStatus::Failed
        };

        CallbackVerification {
            is_valid: true,
            order_ref,
            transaction_id,
            amount,
            status,
            message: response_message(response_code).to_string(),
            pay_date,
            raw_data,
        }
    }

    async fn post_merchant_api(
        &self,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        tracing::debug!(gateway = GATEWAY_NAME, status = %status, body = %text, "merchant API response");

        serde_json::from_str(&text)
            .map_err(|e| GatewayError::Protocol(format!("unparseable merchant API response: {}", e)))
    }
}

#[async_trait::async_trait]
impl PaymentGateway for VnpayGateway {
    fn gateway_name(&self) -> &'static str {
        GATEWAY_NAME
    }

    fn generate_payment_url(&self, request: &PaymentUrlRequest) -> Result<PaymentUrl, GatewayError> {
        let amount_minor = money::to_minor_units(request.amount)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VNP_VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), amount_minor.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), request.order_ref.clone());
        params.insert("vnp_OrderInfo".to_string(), request.description.clone());
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert(
            "vnp_Locale".to_string(),
            request.locale.clone().unwrap_or_else(|| "vn".to_string()),
        );
        params.insert("vnp_ReturnUrl".to_string(), request.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), request.client_ip.clone());
        params.insert(
            "vnp_CreateDate".to_string(),
            Self::format_wire_timestamp(Utc::now()),
        );

        let query = Self::hash_data(&params);
        let secure_hash = self.sign(&query)?;

        let payment_url = format!(
            "{}?{}&vnp_SecureHash={}",
            self.config.payment_url, query, secure_hash
        );

        tracing::info!(
            gateway = GATEWAY_NAME,
            order_ref = %request.order_ref,
            amount = %request.amount,
            "payment redirect URL generated"
        );

        Ok(PaymentUrl {
            payment_url,
            order_ref: request.order_ref.clone(),
        })
    }

    fn verify_callback(&self, params: &HashMap<String, String>) -> CallbackVerification {
        self.verify_params(params)
    }

    fn verify_ipn(&self, params: &HashMap<String, String>) -> CallbackVerification {
        self.verify_params(params)
    }

    async fn initiate_refund(&self, request: &RefundRequest) -> Result<RefundOutcome, GatewayError> {
        let amount_minor = money::to_minor_units(request.amount)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        // "02" is a full refund, "03" partial, per the merchant API.
        let transaction_type = if request.amount == request.original_amount {
            "02"
        } else {
            "03"
        };

        let request_id = Uuid::new_v4().simple().to_string();
        let create_date = Self::format_wire_timestamp(Utc::now());
        let transaction_date = Self::format_wire_timestamp(request.transaction_date);

        let hash_payload = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            request_id,
            VNP_VERSION,
            "refund",
            self.config.tmn_code,
            transaction_type,
            request.order_ref,
            amount_minor,
            request.transaction_id,
            transaction_date,
            request.requested_by,
            create_date,
            SERVER_IP,
            request.reason,
        );
        let secure_hash = self.sign(&hash_payload)?;

        let body = json!({
            "vnp_RequestId": request_id,
            "vnp_Version": VNP_VERSION,
            "vnp_Command": "refund",
            "vnp_TmnCode": self.config.tmn_code,
            "vnp_TransactionType": transaction_type,
            "vnp_TxnRef": request.order_ref,
            "vnp_Amount": amount_minor,
            "vnp_OrderInfo": request.reason,
            "vnp_TransactionNo": request.transaction_id,
            "vnp_TransactionDate": transaction_date,
            "vnp_CreateBy": request.requested_by,
            "vnp_CreateDate": create_date,
            "vnp_IpAddr": SERVER_IP,
            "vnp_SecureHash": secure_hash,
        });

        let raw_data = self.post_merchant_api(body).await?;

        let response_code = raw_data
            .get("vnp_ResponseCode")
            .and_then(|c| c.as_str())
            .unwrap_or("99")
            .to_string();
        let success = response_code == "00";
        let refund_transaction_id = raw_data
            .get("vnp_TransactionNo")
            .and_then(|t| t.as_str())
            .map(str::to_string);

        if success {
            tracing::info!(
                gateway = GATEWAY_NAME,
                order_ref = %request.order_ref,
                amount = %request.amount,
                "gateway refund accepted"
            );
        } else {
            tracing::warn!(
                gateway = GATEWAY_NAME,
                order_ref = %request.order_ref,
                response_code = %response_code,
                "gateway refund declined"
            );
        }

        Ok(RefundOutcome {
            success,
            refund_transaction_id,
            message: response_message(&response_code).to_string(),
            response_code,
            raw_data,
        })
    }

    async fn query_transaction(
        &self,
        order_ref: &str,
        transaction_date: DateTime<Utc>,
    ) -> Result<TransactionQuery, GatewayError> {
        let request_id = Uuid::new_v4().simple().to_string();
        let create_date = Self::format_wire_timestamp(Utc::now());
        let wire_transaction_date = Self::format_wire_timestamp(transaction_date);
        let order_info = format!("Transaction status query for {}", order_ref);

        let hash_payload = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            request_id,
            VNP_VERSION,
            "querydr",
            self.config.tmn_code,
            order_ref,
            wire_transaction_date,
            create_date,
            SERVER_IP,
            order_info,
        );
        let secure_hash = self.sign(&hash_payload)?;

        let body = json!({
            "vnp_RequestId": request_id,
            "vnp_Version": VNP_VERSION,
            "vnp_Command": "querydr",
            "vnp_TmnCode": self.config.tmn_code,
            "vnp_TxnRef": order_ref,
            "vnp_OrderInfo": order_info,
            "vnp_TransactionDate": wire_transaction_date,
            "vnp_CreateDate": create_date,
            "vnp_IpAddr": SERVER_IP,
            "vnp_SecureHash": secure_hash,
        });

        let raw_data = self.post_merchant_api(body).await?;

        let response_code = raw_data
            .get("vnp_ResponseCode")
            .and_then(|c| c.as_str())
            .unwrap_or("99");
        let found = response_code == "00";
        let transaction_status = raw_data
            .get("vnp_TransactionStatus")
            .and_then(|s| s.as_str())
            .unwrap_or("");
        let status = if found && transaction_status == "00" {
            CallbackStatus::Success
        } else {
            CallbackStatus::Failed
        };
        let transaction_id = raw_data
            .get("vnp_TransactionNo")
            .and_then(|t| t.as_str())
            .map(str::to_string);
        let amount = raw_data
            .get("vnp_Amount")
            .and_then(|a| a.as_i64().or_else(|| a.as_str().and_then(|s| s.parse().ok())))
            .map(money::from_minor_units);

        Ok(TransactionQuery {
            found,
            transaction_id,
            amount,
            status,
            message: response_message(response_code).to_string(),
            raw_data,
        })
    }
}
