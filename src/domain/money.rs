//! Money type
//!
//! Signed fixed-point currency value used for recurring definitions and the
//! ledger entries they produce. Negative values are expenses, positive values
//! are income.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest absolute value accepted (10 billion)
const MAX_ABS_AMOUNT: i64 = 10_000_000_000;

/// Currency precision (cents)
const MAX_SCALE: u32 = 2;

/// Money represents a validated, signed monetary value.
///
/// # Invariants
/// - Value is never zero
/// - At most 2 decimal places
/// - Absolute value is at most 10 billion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use recurring_ledger::domain::Money;
///
/// let rent = Money::new(Decimal::new(-5000, 2)).unwrap();
/// assert!(rent.is_expense());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

/// Errors that can occur when creating Money
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must not be zero")]
    Zero,

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed magnitude ({MAX_ABS_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Money {
    /// Create a new Money value with validation.
    ///
    /// # Errors
    /// - `MoneyError::Zero` if value == 0
    /// - `MoneyError::TooManyDecimals` if more than 2 decimal places
    /// - `MoneyError::Overflow` if |value| > 10 billion
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_zero() {
            return Err(MoneyError::Zero);
        }

        // Trailing zeros ("50.000") are not extra precision
        let normalized = value.normalize();
        if normalized.scale() > MAX_SCALE {
            return Err(MoneyError::TooManyDecimals(normalized.scale()));
        }

        let max = Decimal::from(MAX_ABS_AMOUNT);
        if value.abs() > max {
            return Err(MoneyError::Overflow);
        }

        let mut value = value;
        value.rescale(MAX_SCALE);
        Ok(Self(value))
    }

    /// Create Money from a whole number of currency units.
    pub fn from_integer(value: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::from(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Negative amounts leave the account.
    pub fn is_expense(&self) -> bool {
        self.0.is_sign_negative()
    }

    pub fn is_income(&self) -> bool {
        !self.is_expense()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Money::new(decimal)
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Money::from_str(&value)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        format!("{:.2}", money.0)
    }
}
