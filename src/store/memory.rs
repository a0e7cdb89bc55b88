//! In-memory store implementation for testing.
//!
//! This module provides [`InMemoryRecurringStore`], a thread-safe implementation
//! of the [`RecurringStore`] trait. Every write happens under a single lock, so the
//! compare-and-swap and the ledger insert of a cursor advance are atomic exactly as
//! they are in PostgreSQL.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No cross-process coordination
//! - **No persistence**: All state is lost when the process exits

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{MaterializedTransaction, RecurringDefinition, TransactionFilter};

use super::{AdvanceOutcome, CursorAdvance, DefinitionFilter, RecurringStore, StoreError};

#[derive(Debug, Default)]
struct State {
    /// account id -> owning user
    accounts: HashMap<Uuid, Uuid>,
    /// category id -> owning user
    categories: HashMap<Uuid, Uuid>,
    definitions: HashMap<Uuid, RecurringDefinition>,
    transactions: Vec<MaterializedTransaction>,
    /// Definitions whose cursor advance fails
    failing: HashSet<Uuid>,
    offline: bool,
}

impl State {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

/// In-memory recurring store for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryRecurringStore {
    state: RwLock<State>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryRecurringStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account owned by `user_id` and return its id.
    pub fn add_account(&self, user_id: Uuid) -> Uuid {
        let account_id = Uuid::new_v4();
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .accounts
            .insert(account_id, user_id);
        account_id
    }

    /// Register a category owned by `user_id` and return its id.
    pub fn add_category(&self, user_id: Uuid) -> Uuid {
        let category_id = Uuid::new_v4();
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .categories
            .insert(category_id, user_id);
        category_id
    }

    /// Make every cursor advance of `definition_id` fail with a retryable error.
    pub fn fail_definition(&self, definition_id: Uuid) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failing
            .insert(definition_id);
    }

    /// Undo [`fail_definition`](Self::fail_definition).
    pub fn heal_definition(&self, definition_id: Uuid) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failing
            .remove(&definition_id);
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).offline = offline;
    }

    /// Number of ledger entries recorded so far
    pub fn transaction_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .transactions
            .len()
    }
}

#[async_trait]
impl RecurringStore for InMemoryRecurringStore {
    async fn account_owned_by(&self, account_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        state.check_online()?;
        Ok(state.accounts.get(&account_id) == Some(&user_id))
    }

    async fn category_owned_by(
        &self,
        category_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        state.check_online()?;
        Ok(state.categories.get(&category_id) == Some(&user_id))
    }

    async fn insert_definition(&self, definition: &RecurringDefinition) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.check_online()?;
        state.definitions.insert(definition.id, definition.clone());
        Ok(())
    }

    async fn get_definition(&self, id: Uuid) -> Result<Option<RecurringDefinition>, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        state.check_online()?;
        Ok(state.definitions.get(&id).cloned())
    }

    async fn list_definitions(
        &self,
        filter: &DefinitionFilter,
    ) -> Result<Vec<RecurringDefinition>, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        state.check_online()?;

        let mut definitions: Vec<RecurringDefinition> = state
            .definitions
            .values()
            .filter(|definition| filter.matches(definition))
            .cloned()
            .collect();
        definitions.sort_by_key(|d| (d.next_occurrence_date, d.id));
        Ok(definitions)
    }

    async fn update_definition(
        &self,
        definition: &RecurringDefinition,
        expected_cursor: NaiveDate,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.check_online()?;

        let stored = state
            .definitions
            .get_mut(&definition.id)
            .ok_or(StoreError::DefinitionNotFound(definition.id))?;
        if stored.next_occurrence_date != expected_cursor || stored.version != expected_version {
            return Err(StoreError::VersionConflict(definition.id));
        }

        *stored = definition.clone();
        Ok(())
    }

    async fn delete_definition(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.check_online()?;
        state
            .definitions
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::DefinitionNotFound(id))
    }

    async fn has_transactions(&self, definition_id: Uuid) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        state.check_online()?;
        Ok(state
            .transactions
            .iter()
            .any(|t| t.recurring_definition_id == Some(definition_id)))
    }

    async fn advance_cursor(&self, advance: CursorAdvance) -> Result<AdvanceOutcome, StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.check_online()?;

        if state.failing.contains(&advance.definition_id) {
            return Err(StoreError::Unavailable(format!(
                "injected failure for definition {}",
                advance.definition_id
            )));
        }

        let Some(stored) = state.definitions.get_mut(&advance.definition_id) else {
            return Ok(AdvanceOutcome::Conflict);
        };
        if !stored.active
            || stored.next_occurrence_date != advance.expected_cursor
            || stored.version != advance.expected_version
        {
            return Ok(AdvanceOutcome::Conflict);
        }

        stored.next_occurrence_date = advance.new_cursor;
        stored.active = advance.still_active;
        stored.updated_at = chrono::Utc::now();
        state.transactions.push(advance.entry.clone());

        Ok(AdvanceOutcome::Applied(advance.entry))
    }

    async fn deactivate(
        &self,
        id: Uuid,
        expected_cursor: NaiveDate,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.check_online()?;

        match state.definitions.get_mut(&id) {
            Some(stored)
                if stored.active
                    && stored.next_occurrence_date == expected_cursor
                    && stored.version == expected_version =>
            {
                stored.active = false;
                stored.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<MaterializedTransaction>, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        state.check_online()?;

        let mut transactions: Vec<MaterializedTransaction> = state
            .transactions
            .iter()
            .filter(|transaction| filter.matches(transaction))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for same-day entries
        transactions.sort_by_key(|t| t.date);
        Ok(transactions)
    }
}
