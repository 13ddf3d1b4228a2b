//! Unified error types for the marketplace core.
//!
//! Every fallible operation in `core` and `payment` returns [`Result`], so callers
//! (the HTTP layer, the bootstrap binary, tests) match on a single enum.

use crate::payment::ProcessorError;
use thiserror::Error;

/// All errors surfaced by the marketplace core.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Caller supplied input that fails a business rule
    #[error("Validation failed: {message}")]
    Validation {
        /// Which rule failed
        message: String,
    },

    /// Monetary amount is negative, zero where not allowed, or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Rating outside the 0..=5 star range
    #[error("Invalid rating {rating}: must be between 0 and 5")]
    InvalidRating {
        /// The rejected rating
        rating: i32,
    },

    /// A referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"item"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The caller is not allowed to perform the operation
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Why the operation was refused
        message: String,
    },

    /// The payment processor rejected the request or could not be reached
    #[error("Payment processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// Webhook payload failed signature verification
    #[error("Invalid webhook signature: {message}")]
    WebhookSignature {
        /// Why verification failed
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] with any displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
