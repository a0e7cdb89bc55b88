//! Domain module
//!
//! Core domain types and scheduling rules.

pub mod context;
pub mod definition;
pub mod error;
pub mod frequency;
pub mod money;
pub mod recurrence;
pub mod transaction;

pub use context::OperationContext;
pub use definition::{DefinitionChanges, NewRecurringDefinition, RecurringDefinition};
pub use error::DomainError;
pub use frequency::{Frequency, Interval};
pub use money::{Money, MoneyError};
pub use recurrence::{next_occurrence, next_occurrence_on_day, Occurrences};
pub use transaction::{LedgerSummary, MaterializedTransaction, TransactionFilter};
