use billing_service::config::Config;
use billing_service::services::{metrics, Database};
use clinic_core::observability::logging::init_tracing;
use secrecy::ExposeSecret;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(&config.service_name, "info,billing_service=debug");
    metrics::init_metrics();

    let database = Database::new(
        config.database.url.expose_secret(),
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;
    database.run_migrations().await?;
    database.health_check().await?;

    tracing::info!(
        service = %config.service_name,
        gateway_payment_url = %config.vnpay.payment_url,
        "billing service ready"
    );

    // Transport wiring (HTTP/gRPC) is hosted elsewhere; this binary
    // owns the schema and keeps the pool warm until shutdown.
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    Ok(())
}
