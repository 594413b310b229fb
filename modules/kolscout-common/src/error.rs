use thiserror::Error;

#[derive(Error, Debug)]
pub enum KolScoutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cancellation store error: {0}")]
    Cancellation(String),

    #[error("Run status error: {0}")]
    Status(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
