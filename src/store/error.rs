//! Store Errors
//!
//! Error types for recurring definition and ledger persistence.

use uuid::Uuid;

use crate::domain::DomainError;

/// Errors that can occur in the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Definition does not exist
    #[error("Recurring definition not found: {0}")]
    DefinitionNotFound(Uuid),

    /// Conditional update lost against a concurrent writer
    #[error("Concurrent modification of recurring definition {0}")]
    VersionConflict(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend temporarily unusable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored row no longer satisfies domain rules
    #[error("Invalid stored data for {id}: {source}")]
    InvalidRow {
        id: Uuid,
        #[source]
        source: DomainError,
    },
}

impl StoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict(_))
    }

    /// Check if the operation may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::VersionConflict(_) | StoreError::Unavailable(_) => true,
            StoreError::Database(e) => !matches!(e, sqlx::Error::RowNotFound),
            StoreError::DefinitionNotFound(_) | StoreError::InvalidRow { .. } => false,
        }
    }
}
