//! Engine Errors

use chrono::NaiveDate;
use uuid::Uuid;

use crate::store::StoreError;

/// Errors raised while materializing a single definition
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cursor sits before the start date; the row was edited outside the API
    #[error("Definition {id} has cursor {cursor} before its start date {start_date}")]
    CorruptDefinition {
        id: Uuid,
        cursor: NaiveDate,
        start_date: NaiveDate,
    },
}

impl EngineError {
    /// Whether the next sweep may succeed without intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store(e) => e.is_retryable(),
            EngineError::CorruptDefinition { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_retryable() {
        let unavailable = EngineError::from(StoreError::Unavailable("down".to_string()));
        assert!(unavailable.is_retryable());
        assert_eq!(unavailable.to_string(), "Storage unavailable: down");

        let corrupt = EngineError::CorruptDefinition {
            id: Uuid::new_v4(),
            cursor: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        };
        assert!(!corrupt.is_retryable());
    }
}
