//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant is turned into an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use moazer_core::error::MoazerError;
use moazer_core::ports::PortError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error raised by one of the core services.
    #[error(transparent)]
    Core(#[from] MoazerError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while running the schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Core(MoazerError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Core(e) => match e {
                MoazerError::Validation(_) => StatusCode::BAD_REQUEST,
                MoazerError::NotFound(_) => StatusCode::NOT_FOUND,
                MoazerError::Forbidden(_) => StatusCode::FORBIDDEN,
                MoazerError::InsufficientAttempts | MoazerError::GuestTrialUsed => {
                    StatusCode::PAYMENT_REQUIRED
                }
                MoazerError::Oracle(_) => StatusCode::SERVICE_UNAVAILABLE,
                MoazerError::InvalidTransition { .. } => StatusCode::CONFLICT,
                MoazerError::Port(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Core(MoazerError::InsufficientAttempts | MoazerError::GuestTrialUsed) => {
                json!({ "error": self.to_string(), "purchase_url": "/plans" })
            }
            ApiError::Core(MoazerError::Oracle(detail)) => {
                error!("Oracle failure surfaced to client: {}", detail);
                json!({
                    "error": "The AI service is unavailable right now. Please try again.",
                    "retryable": true
                })
            }
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Internal error: {:?}", self);
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moazer_core::consultation::ConsultationAction;
    use moazer_core::domain::ConsultationStatus;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (ApiError::validation("x"), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (MoazerError::InsufficientAttempts.into(), StatusCode::PAYMENT_REQUIRED),
            (MoazerError::GuestTrialUsed.into(), StatusCode::PAYMENT_REQUIRED),
            (MoazerError::Forbidden("x".into()).into(), StatusCode::FORBIDDEN),
            (MoazerError::NotFound("x".into()).into(), StatusCode::NOT_FOUND),
            (
                MoazerError::InvalidTransition {
                    from: ConsultationStatus::Closed,
                    action: ConsultationAction::Accept,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (MoazerError::Oracle("x".into()).into(), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{:?}", err);
        }
    }
}
