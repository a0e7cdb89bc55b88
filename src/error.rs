//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Recurring definition not found: {0}")]
    DefinitionNotFound(Uuid),

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DefinitionNotFound(id) => AppError::DefinitionNotFound(id),
            StoreError::VersionConflict(_) => AppError::VersionConflict,
            other => AppError::Store(other),
        }
    }
}

impl From<crate::domain::MoneyError> for AppError {
    fn from(err: crate::domain::MoneyError) -> Self {
        AppError::Domain(err.into())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 404 Not Found
            AppError::DefinitionNotFound(id) => {
                (StatusCode::NOT_FOUND, "definition_not_found", Some(id.to_string()))
            }

            // 409 Conflict
            AppError::VersionConflict => {
                (StatusCode::CONFLICT, "version_conflict", None)
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InvalidAmount(e) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(e.to_string()))
                }
                DomainError::InvalidFrequency(value) => {
                    (StatusCode::BAD_REQUEST, "invalid_frequency", Some(value.clone()))
                }
                DomainError::InvalidInterval(value) => {
                    (StatusCode::BAD_REQUEST, "invalid_interval", Some(value.to_string()))
                }
                DomainError::InvalidDateRange { .. } => {
                    (StatusCode::BAD_REQUEST, "invalid_date_range", Some(domain_err.to_string()))
                }
                DomainError::EmptyDescription => {
                    (StatusCode::BAD_REQUEST, "empty_description", None)
                }
                DomainError::AccountNotFound(id) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(id.to_string()))
                }
                DomainError::CategoryNotFound(id) => {
                    (StatusCode::NOT_FOUND, "category_not_found", Some(id.to_string()))
                }
            },

            // 503 when a retry may succeed, 500 otherwise
            AppError::Store(e) if matches!(e, StoreError::Unavailable(_)) => {
                tracing::warn!("Storage unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", None)
            }
            AppError::Store(e) => {
                tracing::error!("Storage error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
