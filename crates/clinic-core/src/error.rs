//! Domain-level error types.

use thiserror::Error;

/// Domain errors - invalid input to the rate limiting domain.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
