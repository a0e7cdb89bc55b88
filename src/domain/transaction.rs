//! Ledger transactions
//!
//! Entries produced by the engine. Apart from the weak back-reference they are
//! indistinguishable from manually entered transactions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Money, RecurringDefinition};

/// A single ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedTransaction {
    pub id: Uuid,
    /// Originating definition. Not owning: the definition may since have
    /// been deleted.
    pub recurring_definition_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: Money,
    pub date: NaiveDate,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl MaterializedTransaction {
    /// Ledger entry for one occurrence of `definition`
    pub fn for_occurrence(definition: &RecurringDefinition, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            recurring_definition_id: Some(definition.id),
            user_id: definition.user_id,
            amount: definition.amount,
            date,
            account_id: definition.account_id,
            category_id: definition.category_id,
            description: definition.description.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Query over the ledger, used by report and budget readers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub recurring_definition_id: Option<Uuid>,
}

impl TransactionFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn for_definition(definition_id: Uuid) -> Self {
        Self {
            recurring_definition_id: Some(definition_id),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn matches(&self, transaction: &MaterializedTransaction) -> bool {
        self.user_id.map_or(true, |id| transaction.user_id == id)
            && self.from.map_or(true, |from| transaction.date >= from)
            && self.to.map_or(true, |to| transaction.date <= to)
            && self.account_id.map_or(true, |id| transaction.account_id == id)
            && self
                .category_id
                .map_or(true, |id| transaction.category_id == Some(id))
            && self
                .recurring_definition_id
                .map_or(true, |id| transaction.recurring_definition_id == Some(id))
    }
}

/// Income and expense totals over a set of transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub income: Decimal,
    /// Sum of negative amounts, reported as a positive number
    pub expenses: Decimal,
    pub net: Decimal,
    pub transaction_count: usize,
}

impl LedgerSummary {
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a MaterializedTransaction>,
    {
        transactions
            .into_iter()
            .fold(Self::default(), |mut summary, transaction| {
                let value = transaction.amount.value();
                if transaction.amount.is_expense() {
                    summary.expenses -= value;
                } else {
                    summary.income += value;
                }
                summary.net += value;
                summary.transaction_count += 1;
                summary
            })
    }
}
