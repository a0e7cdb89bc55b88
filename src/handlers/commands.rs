//! Command definitions
//!
//! Commands represent intentions to change a recurring definition. Amounts,
//! frequencies and intervals arrive as raw values and are validated by the
//! handlers.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::domain::{DefinitionChanges, DomainError, Frequency, Interval, Money};

// =========================================================================
// CreateRecurringCommand
// =========================================================================

/// Command to create a recurring definition for the request user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecurringCommand {
    pub description: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Signed amount as string for precise decimal (negative = expense)
    pub amount: String,
    /// DAILY, WEEKLY, MONTHLY or YEARLY
    pub frequency: String,
    /// Defaults to 1
    #[serde(default)]
    pub interval: Option<i64>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub account_id: Uuid,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_subscription: bool,
}

impl CreateRecurringCommand {
    pub fn new(
        description: impl Into<String>,
        amount: impl Into<String>,
        frequency: impl Into<String>,
        start_date: NaiveDate,
        account_id: Uuid,
    ) -> Self {
        Self {
            description: description.into(),
            notes: None,
            amount: amount.into(),
            frequency: frequency.into(),
            interval: None,
            start_date,
            end_date: None,
            account_id,
            category_id: None,
            is_subscription: false,
        }
    }

    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn as_subscription(mut self) -> Self {
        self.is_subscription = true;
        self
    }

    /// Parsed amount, frequency and interval
    pub(crate) fn schedule(&self) -> Result<(Money, Frequency, Interval), DomainError> {
        let amount: Money = self.amount.parse()?;
        let frequency: Frequency = self.frequency.parse()?;
        let interval = match self.interval {
            Some(value) => Interval::new(value)?,
            None => Interval::ONE,
        };
        Ok((amount, frequency, interval))
    }
}

// =========================================================================
// UpdateRecurringCommand
// =========================================================================

/// Partial update of a recurring definition.
///
/// Absent fields stay unchanged. For `notes`, `end_date` and `category_id`
/// an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecurringCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_subscription: Option<bool>,
}

impl UpdateRecurringCommand {
    /// Validate raw values into domain changes
    pub(crate) fn changes(&self) -> Result<DefinitionChanges, DomainError> {
        Ok(DefinitionChanges {
            description: self.description.clone(),
            notes: self.notes.clone(),
            amount: self.amount.as_deref().map(str::parse).transpose()?,
            frequency: self.frequency.as_deref().map(str::parse).transpose()?,
            interval: self.interval.map(Interval::new).transpose()?,
            start_date: self.start_date,
            end_date: self.end_date,
            account_id: self.account_id,
            category_id: self.category_id,
            is_subscription: self.is_subscription,
        })
    }
}

/// Marks a field that was present in the payload, even when it is `null`
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
