use thiserror::Error;

#[derive(Error, Debug)]
pub enum TwoFactorError {
    #[error("Two-factor authentication is not set up")]
    NotSetUp,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code expired")]
    Expired,

    #[error("Two-factor authentication is already enabled")]
    AlreadyEnabled,

    #[error("Two-factor authentication is already disabled")]
    AlreadyDisabled,

    #[error("SMS gateway error: {0}")]
    Gateway(String),

    #[error("TOTP error: {0}")]
    Totp(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TwoFactorError>;
