//! Postgres persistence for billing-service.
//!
//! Domain entities never derive `FromRow`; thin row structs sit at the
//! serialization boundary and convert through the models'
//! `reconstitute` constructors. Guarded updates carry the expected
//! status in the `WHERE` clause so a concurrent writer makes the
//! statement touch zero rows instead of clobbering a settlement.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};
use uuid::Uuid;

use clinic_core::error::AppError;

use crate::models::{
    CreateArchive, GatewayArchive, Invoice, InvoiceStatus, Payment, PaymentMethod, PaymentStatus,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::BillingRepository;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    appointment_id: Uuid,
    invoice_number: String,
    status: String,
    issue_date: NaiveDate,
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
    total_amount: Decimal,
    notes: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice::reconstitute(
            row.id,
            row.appointment_id,
            row.invoice_number,
            InvoiceStatus::from_string(&row.status),
            row.issue_date,
            row.subtotal,
            row.discount,
            row.tax,
            row.total_amount,
            row.notes,
            row.paid_at,
            row.created_at,
        )
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    invoice_id: Uuid,
    order_ref: String,
    payment_method: String,
    status: String,
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
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment::reconstitute(
            row.id,
            row.invoice_id,
            row.order_ref,
            PaymentMethod::from_string(&row.payment_method),
            PaymentStatus::from_string(&row.status),
            row.amount,
            row.transaction_id,
            row.idempotency_key,
            row.paid_at,
            row.received_by,
            row.gateway_response,
            row.refund_amount,
            row.refund_date,
            row.refund_reason,
            row.notes,
            row.created_at,
        )
    }
}

#[derive(sqlx::FromRow)]
struct ArchiveRow {
    id: Uuid,
    payment_id: Option<Uuid>,
    gateway_name: String,
    gateway_response: serde_json::Value,
    transaction_timestamp: Option<DateTime<Utc>>,
    archived_at: DateTime<Utc>,
}

impl From<ArchiveRow> for GatewayArchive {
    fn from(row: ArchiveRow) -> Self {
        GatewayArchive {
            id: row.id,
            payment_id: row.payment_id,
            gateway_name: row.gateway_name,
            gateway_response: row.gateway_response,
            transaction_timestamp: row.transaction_timestamp,
            archived_at: row.archived_at,
        }
    }
}

const SELECT_INVOICE: &str = r#"
    SELECT id, appointment_id, invoice_number, status, issue_date,
           subtotal, discount, tax, total_amount, notes, paid_at, created_at
    FROM invoices
"#;

const SELECT_PAYMENT: &str = r#"
    SELECT id, invoice_id, order_ref, payment_method, status, amount,
           transaction_id, idempotency_key, paid_at, received_by,
           gateway_response, refund_amount, refund_date, refund_reason,
           notes, created_at
    FROM payments
"#;

const UPDATE_INVOICE_GUARDED: &str = r#"
    UPDATE invoices
    SET status = $2, discount = $3, tax = $4, total_amount = $5,
        notes = $6, paid_at = $7
    WHERE id = $1 AND status = $8
"#;

const UPDATE_PAYMENT_GUARDED: &str = r#"
    UPDATE payments
    SET status = $2, transaction_id = $3, paid_at = $4,
        gateway_response = $5, refund_amount = $6, refund_date = $7,
        refund_reason = $8, notes = $9
    WHERE id = $1 AND status = $10
"#;

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BillingRepository for Database {
    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn create_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO invoices (id, appointment_id, invoice_number, status, issue_date,
                                  subtotal, discount, tax, total_amount, notes, paid_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.appointment_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.subtotal)
        .bind(invoice.discount)
        .bind(invoice.tax)
        .bind(invoice.total_amount)
        .bind(&invoice.notes)
        .bind(invoice.paid_at)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();

        info!(invoice_id = %invoice.id, "Invoice created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_invoice"])
            .start_timer();

        let row = sqlx::query_as::<_, InvoiceRow>(&format!("{} WHERE id = $1", SELECT_INVOICE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(row.map(Invoice::from))
    }

    #[instrument(skip(self))]
    async fn find_invoice_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_invoice_by_appointment"])
            .start_timer();

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "{} WHERE appointment_id = $1",
            SELECT_INVOICE
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(row.map(Invoice::from))
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    async fn update_invoice(
        &self,
        invoice: &Invoice,
        expected: InvoiceStatus,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let result = sqlx::query(UPDATE_INVOICE_GUARDED)
            .bind(invoice.id)
            .bind(invoice.status.as_str())
            .bind(invoice.discount)
            .bind(invoice.tax)
            .bind(invoice.total_amount)
            .bind(&invoice.notes)
            .bind(invoice.paid_at)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn create_payment(&self, payment: &Payment) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO payments (id, invoice_id, order_ref, payment_method, status, amount,
                                  transaction_id, idempotency_key, paid_at, received_by,
                                  gateway_response, refund_amount, refund_date, refund_reason,
                                  notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(payment.id)
        .bind(payment.invoice_id)
        .bind(&payment.order_ref)
        .bind(payment.payment_method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.amount)
        .bind(&payment.transaction_id)
        .bind(&payment.idempotency_key)
        .bind(payment.paid_at)
        .bind(payment.received_by)
        .bind(&payment.gateway_response)
        .bind(payment.refund_amount)
        .bind(payment.refund_date)
        .bind(&payment.refund_reason)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();

        info!(payment_id = %payment.id, order_ref = %payment.order_ref, "Payment created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_payment"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentRow>(&format!("{} WHERE id = $1", SELECT_PAYMENT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(row.map(Payment::from))
    }

    #[instrument(skip(self))]
    async fn find_payment_by_order_ref(&self, order_ref: &str) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_payment_by_order_ref"])
            .start_timer();

        let row =
            sqlx::query_as::<_, PaymentRow>(&format!("{} WHERE order_ref = $1", SELECT_PAYMENT))
                .bind(order_ref)
                .fetch_optional(&self.pool)
                .await?;

        timer.observe_duration();
        Ok(row.map(Payment::from))
    }

    #[instrument(skip(self, idempotency_key))]
    async fn find_active_payment_by_idempotency_key(
        &self,
        invoice_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_active_payment_by_idempotency_key"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "{} WHERE invoice_id = $1 AND idempotency_key = $2 AND status IN ('pending', 'processing')",
            SELECT_PAYMENT
        ))
        .bind(invoice_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(row.map(Payment::from))
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn update_payment(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_payment"])
            .start_timer();

        let result = sqlx::query(UPDATE_PAYMENT_GUARDED)
            .bind(payment.id)
            .bind(payment.status.as_str())
            .bind(&payment.transaction_id)
            .bind(payment.paid_at)
            .bind(&payment.gateway_response)
            .bind(payment.refund_amount)
            .bind(payment.refund_date)
            .bind(&payment.refund_reason)
            .bind(&payment.notes)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }

    #[instrument(
        skip(self, payment, invoice),
        fields(payment_id = %payment.id, invoice_id = %invoice.id)
    )]
    async fn update_payment_and_invoice(
        &self,
        payment: &Payment,
        expected_payment: PaymentStatus,
        invoice: &Invoice,
        expected_invoice: InvoiceStatus,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_payment_and_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let payment_result = sqlx::query(UPDATE_PAYMENT_GUARDED)
            .bind(payment.id)
            .bind(payment.status.as_str())
            .bind(&payment.transaction_id)
            .bind(payment.paid_at)
            .bind(&payment.gateway_response)
            .bind(payment.refund_amount)
            .bind(payment.refund_date)
            .bind(&payment.refund_reason)
            .bind(&payment.notes)
            .bind(expected_payment.as_str())
            .execute(&mut *tx)
            .await?;

        if payment_result.rows_affected() != 1 {
            tx.rollback().await?;
            timer.observe_duration();
            return Ok(false);
        }

        let invoice_result = sqlx::query(UPDATE_INVOICE_GUARDED)
            .bind(invoice.id)
            .bind(invoice.status.as_str())
            .bind(invoice.discount)
            .bind(invoice.tax)
            .bind(invoice.total_amount)
            .bind(&invoice.notes)
            .bind(invoice.paid_at)
            .bind(expected_invoice.as_str())
            .execute(&mut *tx)
            .await?;

        if invoice_result.rows_affected() != 1 {
            tx.rollback().await?;
            timer.observe_duration();
            return Ok(false);
        }

        tx.commit().await?;
        timer.observe_duration();

        info!(
            payment_id = %payment.id,
            invoice_id = %invoice.id,
            payment_status = payment.status.as_str(),
            invoice_status = invoice.status.as_str(),
            "Payment and invoice updated atomically"
        );
        Ok(true)
    }

    #[instrument(skip(self, input))]
    async fn create_archive(&self, input: CreateArchive) -> Result<GatewayArchive, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_archive"])
            .start_timer();

        let archive = GatewayArchive::record(input);
        sqlx::query(
            r#"
            INSERT INTO payment_gateway_archives
                (id, payment_id, gateway_name, gateway_response, transaction_timestamp, archived_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(archive.id)
        .bind(archive.payment_id)
        .bind(&archive.gateway_name)
        .bind(&archive.gateway_response)
        .bind(archive.transaction_timestamp)
        .bind(archive.archived_at)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(archive)
    }

    #[instrument(skip(self))]
    async fn list_archives_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<GatewayArchive>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_archives_for_payment"])
            .start_timer();

        let rows = sqlx::query_as::<_, ArchiveRow>(
            r#"
            SELECT id, payment_id, gateway_name, gateway_response, transaction_timestamp, archived_at
            FROM payment_gateway_archives
            WHERE payment_id = $1
            ORDER BY archived_at
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(rows.into_iter().map(GatewayArchive::from).collect())
    }
}
