//! Error types for Dropgate.

use thiserror::Error;

/// Common error type for Dropgate.
#[derive(Error, Debug)]
pub enum DropgateError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error (file storage, config, log files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource does not exist (or was moved to the trash).
    #[error("{0} not found")]
    NotFound(String),

    /// Resource existed but is terminally unavailable (expired by time or quota).
    #[error("gone: {0}")]
    Gone(String),

    /// Ownership or membership violation.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Password or login mismatch. The caller may retry.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Duplicate account email, duplicate team share, and similar.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Encryption or decryption failure.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DropgateError {
    fn from(e: sqlx::Error) -> Self {
        DropgateError::Database(e.to_string())
    }
}

impl From<crate::auth::PasswordError> for DropgateError {
    fn from(e: crate::auth::PasswordError) -> Self {
        match e {
            crate::auth::PasswordError::VerificationFailed
            | crate::auth::PasswordError::InvalidHash => DropgateError::InvalidCredentials,
            crate::auth::PasswordError::HashError(msg) => DropgateError::Crypto(msg),
            other => DropgateError::Validation(other.to_string()),
        }
    }
}

/// Result type alias for Dropgate operations.
pub type Result<T> = std::result::Result<T, DropgateError>;
