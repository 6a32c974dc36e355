use thiserror::Error;

use crate::domain::RecordId;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("This action requires an authenticated session")]
    Forbidden,

    #[error("Current secret is incorrect")]
    WrongOldSecret,

    #[error("New secret and confirmation do not match")]
    SecretMismatch,

    #[error("New secret must not be empty")]
    EmptySecret,

    #[error("Invalid export file name: {0}")]
    InvalidFileName(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
