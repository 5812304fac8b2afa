pub mod database;
pub mod gateway;
pub mod metrics;
pub mod notifications;
pub mod orchestrator;
pub mod repository;

pub use database::Database;
pub use gateway::VnpayGateway;
pub use orchestrator::{BillingOrchestrator, OrchestratorSettings};
