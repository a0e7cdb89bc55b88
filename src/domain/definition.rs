//! Recurring definition
//!
//! A user-specified template for a repeating ledger entry together with its
//! materialization cursor.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recurrence::{next_occurrence_on_day, Occurrences};
use super::{DomainError, Frequency, Interval, Money};

/// Stored recurring definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringDefinition {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub notes: Option<String>,
    pub amount: Money,
    pub frequency: Frequency,
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Earliest occurrence not yet materialized
    pub next_occurrence_date: NaiveDate,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    pub is_subscription: bool,
    pub active: bool,
    /// Bumped by every user edit; conditional writes check it
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringDefinition {
    /// Build a fresh definition whose cursor sits on its start date.
    pub fn create(new: NewRecurringDefinition, now: DateTime<Utc>) -> Result<Self, DomainError> {
        new.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            description: new.description.trim().to_string(),
            notes: new.notes,
            amount: new.amount,
            frequency: new.frequency,
            interval: new.interval,
            start_date: new.start_date,
            end_date: new.end_date,
            next_occurrence_date: new.start_date,
            account_id: new.account_id,
            category_id: new.category_id,
            is_subscription: new.is_subscription,
            active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Day-of-month that MONTHLY and YEARLY schedules land on
    pub fn anchor_day(&self) -> u32 {
        self.start_date.day()
    }

    /// Occurrence following the current cursor
    pub fn following_occurrence(&self) -> NaiveDate {
        next_occurrence_on_day(
            self.next_occurrence_date,
            self.frequency,
            self.interval,
            self.anchor_day(),
        )
    }

    /// True once the cursor has moved past the end date
    pub fn is_exhausted(&self) -> bool {
        self.end_date
            .is_some_and(|end| self.next_occurrence_date > end)
    }

    /// True if the cursor occurrence should be materialized by `as_of`
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.active && self.next_occurrence_date <= as_of
    }

    /// Dates that have not been materialized yet, oldest first.
    pub fn pending_occurrences(&self) -> impl Iterator<Item = NaiveDate> {
        let limit = if self.active { usize::MAX } else { 0 };
        Occurrences::anchored(
            self.next_occurrence_date,
            self.frequency,
            self.interval,
            self.anchor_day(),
            self.end_date,
        )
        .take(limit)
    }

    /// Apply a user edit, returning the updated definition.
    ///
    /// `has_history` tells whether any ledger entry was recorded for this
    /// definition. Without history the cursor follows the start date in both
    /// directions. With history it only moves up to a later start date and
    /// never back over recorded occurrences. An end date before the cursor
    /// deactivates the definition instead.
    pub fn with_changes(
        &self,
        changes: DefinitionChanges,
        has_history: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let mut updated = self.clone();

        if let Some(description) = changes.description {
            updated.description = non_empty(&description)?;
        }
        if let Some(notes) = changes.notes {
            updated.notes = notes;
        }
        if let Some(amount) = changes.amount {
            updated.amount = amount;
        }
        if let Some(frequency) = changes.frequency {
            updated.frequency = frequency;
        }
        if let Some(interval) = changes.interval {
            updated.interval = interval;
        }
        if let Some(start_date) = changes.start_date {
            updated.start_date = start_date;
        }
        if let Some(end_date) = changes.end_date {
            updated.end_date = end_date;
        }
        if let Some(account_id) = changes.account_id {
            updated.account_id = account_id;
        }
        if let Some(category_id) = changes.category_id {
            updated.category_id = category_id;
        }
        if let Some(is_subscription) = changes.is_subscription {
            updated.is_subscription = is_subscription;
        }

        check_date_range(updated.start_date, updated.end_date)?;

        if !has_history || updated.next_occurrence_date < updated.start_date {
            updated.next_occurrence_date = updated.start_date;
        }
        updated.active = !updated.is_exhausted();
        updated.version = self.version + 1;
        updated.updated_at = now;

        Ok(updated)
    }
}

/// Input for creating a definition
#[derive(Debug, Clone)]
pub struct NewRecurringDefinition {
    pub user_id: Uuid,
    pub description: String,
    pub notes: Option<String>,
    pub amount: Money,
    pub frequency: Frequency,
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    pub is_subscription: bool,
}

impl NewRecurringDefinition {
    pub fn validate(&self) -> Result<(), DomainError> {
        non_empty(&self.description)?;
        check_date_range(self.start_date, self.end_date)
    }
}

/// Partial update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct DefinitionChanges {
    pub description: Option<String>,
    pub notes: Option<Option<String>>,
    pub amount: Option<Money>,
    pub frequency: Option<Frequency>,
    pub interval: Option<Interval>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub account_id: Option<Uuid>,
    pub category_id: Option<Option<Uuid>>,
    pub is_subscription: Option<bool>,
}

impl DefinitionChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.notes.is_none()
            && self.amount.is_none()
            && self.frequency.is_none()
            && self.interval.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.account_id.is_none()
            && self.category_id.is_none()
            && self.is_subscription.is_none()
    }
}

fn non_empty(description: &str) -> Result<String, DomainError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(DomainError::EmptyDescription);
    }
    Ok(trimmed.to_string())
}

fn check_date_range(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), DomainError> {
    match end {
        Some(end) if end < start => Err(DomainError::InvalidDateRange { start, end }),
        _ => Ok(()),
    }
}
