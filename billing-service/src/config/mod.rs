use anyhow::Result;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub vnpay: VnpayConfig,
    pub billing: BillingConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct VnpayConfig {
    /// Merchant terminal code issued by VNPay.
    pub tmn_code: String,
    /// HMAC-SHA512 secret shared with the gateway.
    pub hash_secret: Secret<String>,
    /// Hosted checkout endpoint the customer is redirected to.
    pub payment_url: String,
    /// Merchant API endpoint for refund and transaction query calls.
    pub api_url: String,
    /// Where the gateway sends the customer back after checkout.
    pub return_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BillingConfig {
    /// Flat tax rate applied when generating an invoice (e.g. 0.08).
    pub tax_rate: Decimal,
    /// Minutes after which a PROCESSING payment with no gateway verdict
    /// may be expired during reconciliation.
    pub processing_expiry_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let db_url = env::var("BILLING_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost:5432/billing_db".to_string());
        let max_connections = env::var("BILLING_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("BILLING_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let tmn_code = env::var("VNPAY_TMN_CODE").unwrap_or_else(|_| "".to_string());
        let hash_secret = env::var("VNPAY_HASH_SECRET").unwrap_or_else(|_| "".to_string());
        let payment_url = env::var("VNPAY_PAYMENT_URL").unwrap_or_else(|_| {
            "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()
        });
        let api_url = env::var("VNPAY_API_URL").unwrap_or_else(|_| {
            "https://sandbox.vnpayment.vn/merchant_webapi/api/transaction".to_string()
        });
        let return_url = env::var("VNPAY_RETURN_URL")
            .unwrap_or_else(|_| "http://localhost:3000/payments/vnpay/return".to_string());

        let tax_rate: Decimal = env::var("BILLING_TAX_RATE")
            .unwrap_or_else(|_| "0".to_string())
            .parse()?;
        let processing_expiry_minutes = env::var("BILLING_PROCESSING_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?;

        Ok(Self {
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            vnpay: VnpayConfig {
                tmn_code,
                hash_secret: Secret::new(hash_secret),
                payment_url,
                api_url,
                return_url,
            },
            billing: BillingConfig {
                tax_rate,
                processing_expiry_minutes,
            },
            service_name: "billing-service".to_string(),
        })
    }
}
