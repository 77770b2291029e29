//! crates/moazer_core/src/error.rs
//!
//! The error taxonomy shared by the core services.

use crate::consultation::ConsultationAction;
use crate::domain::ConsultationStatus;
use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum MoazerError {
    /// Bad input; the caller re-shows the same form. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller is known but may not perform this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("No attempts left in the wallet")]
    InsufficientAttempts,

    #[error("The guest trial has already been used")]
    GuestTrialUsed,

    /// The oracle failed, timed out or returned something unusable. Retryable.
    #[error("Oracle failure: {0}")]
    Oracle(String),

    #[error("Cannot {action} a consultation that is {from}")]
    InvalidTransition {
        from: ConsultationStatus,
        action: ConsultationAction,
    },

    #[error("Service Port Error: {0}")]
    Port(PortError),
}

impl From<PortError> for MoazerError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => MoazerError::NotFound(what),
            PortError::Unauthorized => MoazerError::Forbidden("unauthorized".to_string()),
            other => MoazerError::Port(other),
        }
    }
}

/// A convenience type alias for `Result<T, MoazerError>`.
pub type MoazerResult<T> = Result<T, MoazerError>;
