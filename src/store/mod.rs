//! Store module
//!
//! Persistence for recurring definitions and the ledger they write to.
//!
//! The [`RecurringStore`] trait keeps the engine independent of the backend:
//! [`PgRecurringStore`] runs against PostgreSQL, [`InMemoryRecurringStore`]
//! backs tests and local runs. Both honor the same contract: the cursor
//! advance and the ledger insert of [`RecurringStore::advance_cursor`] persist
//! together or not at all.

mod error;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{MaterializedTransaction, RecurringDefinition, TransactionFilter};

pub use error::StoreError;
pub use memory::InMemoryRecurringStore;
pub use postgres::PgRecurringStore;

/// Store handle shared between the API, the engine and the scheduler
pub type SharedStore = Arc<dyn RecurringStore>;

/// Selection of recurring definitions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionFilter {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Cursor on or before this date
    #[serde(default)]
    pub due_on_or_before: Option<NaiveDate>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub is_subscription: Option<bool>,
}

impl DefinitionFilter {
    /// Active definitions of every user whose cursor is at or before `as_of`
    pub fn due(as_of: NaiveDate) -> Self {
        Self {
            due_on_or_before: Some(as_of),
            active: Some(true),
            ..Default::default()
        }
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn subscriptions(mut self, is_subscription: Option<bool>) -> Self {
        self.is_subscription = is_subscription;
        self
    }

    pub fn matches(&self, definition: &RecurringDefinition) -> bool {
        self.user_id.map_or(true, |id| definition.user_id == id)
            && self
                .due_on_or_before
                .map_or(true, |date| definition.next_occurrence_date <= date)
            && self.active.map_or(true, |active| definition.active == active)
            && self
                .is_subscription
                .map_or(true, |flag| definition.is_subscription == flag)
    }
}

/// Compare-and-swap of a definition's cursor plus the ledger entry for the
/// occurrence being consumed.
#[derive(Debug, Clone)]
pub struct CursorAdvance {
    pub definition_id: Uuid,
    /// Cursor value the caller read; the update applies only if unchanged
    pub expected_cursor: NaiveDate,
    /// Version of the snapshot the new cursor was computed from
    pub expected_version: i64,
    pub new_cursor: NaiveDate,
    /// `active` after the advance (false once past the end date)
    pub still_active: bool,
    /// Entry dated at `expected_cursor`
    pub entry: MaterializedTransaction,
}

/// Result of a [`CursorAdvance`]
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// Cursor moved and the entry was recorded
    Applied(MaterializedTransaction),
    /// Someone else already moved the cursor; nothing was written
    Conflict,
}

/// Persistence contract for the recurring engine.
///
/// All methods are `Send + Sync` so one store can be shared by the HTTP
/// handlers and any number of concurrent sweeps.
#[async_trait]
pub trait RecurringStore: Send + Sync {
    /// True if `account_id` exists and belongs to `user_id`
    async fn account_owned_by(&self, account_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// True if `category_id` exists and belongs to `user_id`
    async fn category_owned_by(&self, category_id: Uuid, user_id: Uuid)
        -> Result<bool, StoreError>;

    async fn insert_definition(&self, definition: &RecurringDefinition) -> Result<(), StoreError>;

    async fn get_definition(&self, id: Uuid) -> Result<Option<RecurringDefinition>, StoreError>;

    /// Definitions matching `filter`, ordered by cursor then id
    async fn list_definitions(
        &self,
        filter: &DefinitionFilter,
    ) -> Result<Vec<RecurringDefinition>, StoreError>;

    /// Overwrite a definition after a user edit, only if its cursor and
    /// version are still the ones the edit was based on.
    ///
    /// Fails with [`StoreError::VersionConflict`] when a sweep or another edit
    /// got there first, and [`StoreError::DefinitionNotFound`] when the
    /// definition is gone.
    async fn update_definition(
        &self,
        definition: &RecurringDefinition,
        expected_cursor: NaiveDate,
        expected_version: i64,
    ) -> Result<(), StoreError>;

    /// Remove a definition. Ledger entries that reference it are kept.
    async fn delete_definition(&self, id: Uuid) -> Result<(), StoreError>;

    /// True if any ledger entry references `definition_id`
    async fn has_transactions(&self, definition_id: Uuid) -> Result<bool, StoreError>;

    /// Atomically advance the cursor and record the occurrence.
    async fn advance_cursor(&self, advance: CursorAdvance) -> Result<AdvanceOutcome, StoreError>;

    /// Mark an exhausted definition inactive, only if its cursor and version
    /// are unchanged. Returns false when nothing changed.
    async fn deactivate(
        &self,
        id: Uuid,
        expected_cursor: NaiveDate,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    /// Ledger entries matching `filter`, ordered by date then creation time
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<MaterializedTransaction>, StoreError>;
}
