//! Error types shared across the engine

use thiserror::Error;

/// Errors surfaced by storage collaborators
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the payment-link collaborator
///
/// A failed link initialization never invalidates the appointment it was
/// requested for; callers downgrade to a reserved-plus-escalate outcome.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("payment provider misconfigured: {0}")]
    Misconfigured(String),
}
