//! Error types for the payment orchestration core.

use rust_decimal::Decimal;

use crate::domain::ProcessorIntent;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Fee rate must be in [0, 1), got {0}")]
    InvalidFeeRate(Decimal),

    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    #[error("Amount overflow")]
    Overflow,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors reported by the card processor.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The card was declined; the processor may still have created the intent.
    #[error("Card declined ({decline_code}): {message}")]
    CardDeclined {
        decline_code: String,
        message: String,
        intent: Option<Box<ProcessorIntent>>,
    },

    #[error("Webhook signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("Processor error {status} ({kind}): {message}")]
    Api {
        kind: String,
        code: Option<String>,
        status: u16,
        message: String,
    },

    #[error("Processor transport error: {0}")]
    Transport(String),

    #[error("Malformed processor payload: {0}")]
    Decode(String),
}

/// Errors from peer services (purchase, user, site).
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("Peer transport error: {0}")]
    Http(String),

    #[error("Peer error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Malformed peer response: {0}")]
    Decode(String),
}

/// Failure to hand a message to the pub/sub system.
#[derive(Debug, thiserror::Error)]
#[error("Publish to {topic} failed: {message}")]
pub struct PublishError {
    pub topic: String,
    pub message: String,
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Conflict(e) => AppError::Conflict(e),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
        }
    }
}

impl From<ProcessorError> for AppError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::SignatureMismatch(_) | ProcessorError::Decode(_) => {
                AppError::BadRequest(err.to_string())
            }
            ProcessorError::CardDeclined { .. } => AppError::BadRequest(err.to_string()),
            ProcessorError::Api { status: 404, .. } => AppError::NotFound(err.to_string()),
            ProcessorError::Api { .. } | ProcessorError::Transport(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<PeerError> for AppError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Unauthorized => AppError::Unauthorized("Invalid credentials".into()),
            PeerError::NotFound(what) => AppError::NotFound(what),
            PeerError::Http(_) | PeerError::Api { .. } | PeerError::Decode(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}
