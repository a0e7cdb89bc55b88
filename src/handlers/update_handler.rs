//! Update Handler
//!
//! Applies a partial edit to a recurring definition.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{OperationContext, RecurringDefinition};
use crate::error::AppError;
use crate::store::SharedStore;

use super::{ensure_references, load_owned, require_user, UpdateRecurringCommand};

/// Handler for recurring definition updates
pub struct UpdateRecurringHandler {
    store: SharedStore,
}

impl UpdateRecurringHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Execute the update command.
    ///
    /// The write only lands if cursor and version are unchanged since the
    /// read. A sweep or another edit that got there first yields
    /// [`AppError::VersionConflict`].
    pub async fn execute(
        &self,
        definition_id: Uuid,
        command: UpdateRecurringCommand,
        context: &OperationContext,
    ) -> Result<RecurringDefinition, AppError> {
        let user_id = require_user(context)?;
        let current = load_owned(&self.store, definition_id, user_id).await?;

        let changes = command.changes()?;
        if changes.is_empty() {
            return Ok(current);
        }

        let has_history = self.store.has_transactions(definition_id).await?;
        let updated = current.with_changes(changes, has_history, Utc::now())?;
        // Only references that changed need to be checked again
        let account_id = (updated.account_id != current.account_id).then_some(updated.account_id);
        let category_id = updated
            .category_id
            .filter(|_| updated.category_id != current.category_id);
        ensure_references(&self.store, user_id, account_id, category_id).await?;

        if let Err(err) = self
            .store
            .update_definition(&updated, current.next_occurrence_date, current.version)
            .await
        {
            if err.is_concurrency_conflict() {
                tracing::debug!(
                    definition_id = %definition_id,
                    version = current.version,
                    "Recurring definition changed concurrently"
                );
            }
            return Err(err.into());
        }

        tracing::info!(
            definition_id = %definition_id,
            next_occurrence = %updated.next_occurrence_date,
            active = updated.active,
            correlation_id = ?context.correlation_id,
            "Recurring definition updated"
        );

        Ok(updated)
    }
}
