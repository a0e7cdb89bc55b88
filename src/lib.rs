//! recurring_ledger Library
//!
//! Recurring-transaction engine for a personal-finance ledger: turns
//! recurrence definitions into ledger entries exactly once per due cycle.
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod handlers;
pub mod jobs;
pub mod store;

mod error;

pub use config::Config;
pub use domain::{DomainError, Money, MoneyError, OperationContext};
pub use error::{AppError, ErrorResponse};
