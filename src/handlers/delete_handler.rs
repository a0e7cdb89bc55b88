//! Delete Handler
//!
//! Removes a recurring definition. Transactions it already created stay in the
//! ledger with a dangling back-reference.

use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::store::SharedStore;

use super::{load_owned, require_user};

/// Handler for recurring definition deletion
pub struct DeleteRecurringHandler {
    store: SharedStore,
}

impl DeleteRecurringHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Execute the delete
    pub async fn execute(
        &self,
        definition_id: Uuid,
        context: &OperationContext,
    ) -> Result<(), AppError> {
        let user_id = require_user(context)?;
        load_owned(&self.store, definition_id, user_id).await?;

        self.store.delete_definition(definition_id).await?;

        tracing::info!(
            definition_id = %definition_id,
            correlation_id = ?context.correlation_id,
            "Recurring definition deleted"
        );

        Ok(())
    }
}
