pub mod error;
pub mod observability;
pub mod utils;
