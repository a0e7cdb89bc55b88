//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use super::MoneyError;

/// Validation and business-rule failures for recurring definitions.
///
/// These are raised synchronously on the create/update path and never reach
/// the scheduling path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Amount failed validation
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    /// Frequency is not one of DAILY, WEEKLY, MONTHLY, YEARLY
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Interval must be a positive integer
    #[error("Invalid interval: {0} (must be at least 1)")]
    InvalidInterval(i64),

    /// End date precedes start date
    #[error("Invalid date range: end date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Description is blank
    #[error("Description must not be empty")]
    EmptyDescription,

    /// Account is missing or owned by another user
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Category is missing or owned by another user
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),
}
