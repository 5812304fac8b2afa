use thiserror::Error;

/// Infrastructure-level error shared across clinic services.
///
/// Domain-specific errors live in the owning service crate and wrap
/// this type for propagation out of repositories and collaborators.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "unique constraint violated: {}",
                    db_err.message()
                ))
            }
            sqlx::Error::RowNotFound => {
                AppError::NotFound(anyhow::anyhow!("row not found"))
            }
            _ => AppError::DatabaseError(anyhow::Error::new(err)),
        }
    }
}
