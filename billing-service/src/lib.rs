pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use error::BillingError;
pub use services::orchestrator::{BillingOrchestrator, OrchestratorSettings};
