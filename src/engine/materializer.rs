//! Materializer
//!
//! Turns the cursor occurrence of one definition into a ledger entry.

use chrono::NaiveDate;

use crate::domain::{MaterializedTransaction, RecurringDefinition};
use crate::store::{AdvanceOutcome, CursorAdvance, SharedStore};

use super::EngineError;

/// One recorded occurrence together with the cursor state it left behind
#[derive(Debug, Clone, PartialEq)]
pub struct Materialization {
    pub transaction: MaterializedTransaction,
    pub next_occurrence_date: NaiveDate,
    pub still_active: bool,
}

/// Result of a single [`Materializer::materialize`] call
#[derive(Debug, Clone, PartialEq)]
pub enum MaterializeOutcome {
    /// One entry was written and the cursor advanced
    Materialized(Materialization),
    /// Inactive, or the cursor is after `as_of`
    NotDue,
    /// Cursor past the end date; the definition is now inactive
    Exhausted,
    /// Another writer moved the cursor first
    AlreadyHandled,
}

/// Applies one recurring definition against the store
#[derive(Clone)]
pub struct Materializer {
    store: SharedStore,
}

impl Materializer {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Materialize the cursor occurrence of `definition` if it is due by `as_of`.
    ///
    /// `definition` is the caller's snapshot. The store only applies the
    /// advance while the stored cursor and version still equal the snapshot's,
    /// so two callers holding the same snapshot produce exactly one entry and
    /// a snapshot taken before a user edit writes nothing.
    pub async fn materialize(
        &self,
        definition: &RecurringDefinition,
        as_of: NaiveDate,
    ) -> Result<MaterializeOutcome, EngineError> {
        let occurrence = definition.next_occurrence_date;

        if !definition.is_due(as_of) {
            return Ok(MaterializeOutcome::NotDue);
        }
        if occurrence < definition.start_date {
            return Err(EngineError::CorruptDefinition {
                id: definition.id,
                cursor: occurrence,
                start_date: definition.start_date,
            });
        }

        if definition.is_exhausted() {
            let deactivated = self
                .store
                .deactivate(definition.id, occurrence, definition.version)
                .await?;
            if !deactivated {
                tracing::debug!(
                    definition_id = %definition.id,
                    "Definition changed before it could be deactivated"
                );
                return Ok(MaterializeOutcome::AlreadyHandled);
            }
            tracing::info!(
                definition_id = %definition.id,
                end_date = ?definition.end_date,
                "Recurring definition exhausted"
            );
            return Ok(MaterializeOutcome::Exhausted);
        }

        let new_cursor = definition.following_occurrence();
        // A saturated cursor cannot advance any further
        let still_active = new_cursor > occurrence
            && definition.end_date.map_or(true, |end| new_cursor <= end);

        let advance = CursorAdvance {
            definition_id: definition.id,
            expected_cursor: occurrence,
            expected_version: definition.version,
            new_cursor,
            still_active,
            entry: MaterializedTransaction::for_occurrence(definition, occurrence),
        };

        match self.store.advance_cursor(advance).await? {
            AdvanceOutcome::Applied(transaction) => {
                tracing::debug!(
                    definition_id = %definition.id,
                    occurrence = %occurrence,
                    next_occurrence = %new_cursor,
                    amount = %transaction.amount,
                    "Materialized recurring transaction"
                );
                Ok(MaterializeOutcome::Materialized(Materialization {
                    transaction,
                    next_occurrence_date: new_cursor,
                    still_active,
                }))
            }
            AdvanceOutcome::Conflict => {
                tracing::debug!(
                    definition_id = %definition.id,
                    occurrence = %occurrence,
                    "Occurrence already materialized by another worker"
                );
                Ok(MaterializeOutcome::AlreadyHandled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Frequency, Interval, Money, NewRecurringDefinition, TransactionFilter};
    use crate::store::{InMemoryRecurringStore, RecurringStore};
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup(
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> (Arc<InMemoryRecurringStore>, Materializer, RecurringDefinition) {
        let store = Arc::new(InMemoryRecurringStore::new());
        let user_id = Uuid::new_v4();
        let definition = RecurringDefinition::create(
            NewRecurringDefinition {
                user_id,
                description: "Rent".to_string(),
                notes: None,
                amount: Money::from_integer(-50).unwrap(),
                frequency: Frequency::Monthly,
                interval: Interval::ONE,
                start_date: start,
                end_date: end,
                account_id: store.add_account(user_id),
                category_id: None,
                is_subscription: false,
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_definition(&definition).await.unwrap();
        let materializer = Materializer::new(store.clone());
        (store, materializer, definition)
    }

    #[tokio::test]
    async fn test_not_due_before_cursor() {
        let (store, materializer, definition) = setup(date(2024, 3, 1), None).await;

        let outcome = materializer
            .materialize(&definition, date(2024, 2, 29))
            .await
            .unwrap();

        assert_eq!(outcome, MaterializeOutcome::NotDue);
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_materializes_at_pre_update_cursor() {
        let (store, materializer, definition) = setup(date(2024, 1, 31), None).await;

        let outcome = materializer
            .materialize(&definition, date(2024, 1, 31))
            .await
            .unwrap();

        let MaterializeOutcome::Materialized(materialization) = outcome else {
            panic!("expected a materialization, got {outcome:?}");
        };
        assert_eq!(materialization.transaction.date, date(2024, 1, 31));
        assert_eq!(materialization.transaction.recurring_definition_id, Some(definition.id));
        assert_eq!(materialization.transaction.amount, definition.amount);
        assert_eq!(materialization.next_occurrence_date, date(2024, 2, 29));
        assert!(materialization.still_active);

        let stored = store.get_definition(definition.id).await.unwrap().unwrap();
        assert_eq!(stored.next_occurrence_date, date(2024, 2, 29));
        assert_eq!(stored.amount, definition.amount);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_already_handled() {
        let (store, materializer, definition) = setup(date(2024, 1, 15), None).await;
        let as_of = date(2024, 1, 15);

        materializer.materialize(&definition, as_of).await.unwrap();
        let second = materializer.materialize(&definition, as_of).await.unwrap();

        assert_eq!(second, MaterializeOutcome::AlreadyHandled);
        let entries = store
            .list_transactions(&TransactionFilter::for_definition(definition.id))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_last_occurrence_deactivates() {
        let (store, materializer, definition) =
            setup(date(2024, 1, 1), Some(date(2024, 1, 20))).await;

        let outcome = materializer
            .materialize(&definition, date(2024, 1, 1))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            MaterializeOutcome::Materialized(Materialization { still_active: false, .. })
        ));
        let stored = store.get_definition(definition.id).await.unwrap().unwrap();
        assert!(!stored.active);
    }

    #[tokio::test]
    async fn test_cursor_past_end_is_exhausted() {
        let (store, materializer, mut definition) =
            setup(date(2024, 1, 1), Some(date(2024, 3, 1))).await;

        // Cursor Mar 2 while the end date is Mar 1
        definition.next_occurrence_date = date(2024, 3, 2);
        store
            .update_definition(&definition, date(2024, 1, 1), definition.version)
            .await
            .unwrap();

        let outcome = materializer
            .materialize(&definition, date(2024, 3, 10))
            .await
            .unwrap();

        assert_eq!(outcome, MaterializeOutcome::Exhausted);
        assert_eq!(store.transaction_count(), 0);
        let stored = store.get_definition(definition.id).await.unwrap().unwrap();
        assert!(!stored.active);
    }

    #[tokio::test]
    async fn test_snapshot_from_before_an_edit_writes_nothing() {
        let (store, materializer, definition) = setup(date(2024, 1, 15), None).await;

        // User switches to a weekly schedule after the sweep read the definition
        let mut edited = definition.clone();
        edited.frequency = Frequency::Weekly;
        edited.version += 1;
        store
            .update_definition(&edited, definition.next_occurrence_date, definition.version)
            .await
            .unwrap();

        let outcome = materializer
            .materialize(&definition, date(2024, 1, 15))
            .await
            .unwrap();
        assert_eq!(outcome, MaterializeOutcome::AlreadyHandled);
        assert_eq!(store.transaction_count(), 0);

        let outcome = materializer
            .materialize(&edited, date(2024, 1, 15))
            .await
            .unwrap();
        let MaterializeOutcome::Materialized(materialization) = outcome else {
            panic!("expected a materialization, got {outcome:?}");
        };
        assert_eq!(materialization.next_occurrence_date, date(2024, 1, 22));
    }

    #[tokio::test]
    async fn test_storage_failure_is_retryable() {
        let (store, materializer, definition) = setup(date(2024, 1, 1), None).await;
        store.fail_definition(definition.id);

        let err = materializer
            .materialize(&definition, date(2024, 1, 1))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_cursor_before_start_is_rejected() {
        let (_store, materializer, mut definition) = setup(date(2024, 2, 1), None).await;
        definition.next_occurrence_date = date(2024, 1, 1);

        let err = materializer
            .materialize(&definition, date(2024, 2, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::CorruptDefinition { .. }));
    }
}
