//! Create Handler
//!
//! Validates and stores a new recurring definition.

use chrono::Utc;

use crate::domain::{NewRecurringDefinition, OperationContext, RecurringDefinition};
use crate::error::AppError;
use crate::store::SharedStore;

use super::{ensure_references, require_user, CreateRecurringCommand};

/// Handler for recurring definition creation
pub struct CreateRecurringHandler {
    store: SharedStore,
}

impl CreateRecurringHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Execute the create command.
    ///
    /// The new definition's cursor sits on its start date, so a start date in
    /// the past is caught up by the next sweep.
    pub async fn execute(
        &self,
        command: CreateRecurringCommand,
        context: &OperationContext,
    ) -> Result<RecurringDefinition, AppError> {
        let user_id = require_user(context)?;
        let (amount, frequency, interval) = command.schedule()?;

        let new = NewRecurringDefinition {
            user_id,
            description: command.description,
            notes: command.notes,
            amount,
            frequency,
            interval,
            start_date: command.start_date,
            end_date: command.end_date,
            account_id: command.account_id,
            category_id: command.category_id,
            is_subscription: command.is_subscription,
        };
        new.validate()?;
        ensure_references(&self.store, user_id, Some(new.account_id), new.category_id).await?;

        let definition = RecurringDefinition::create(new, Utc::now())?;
        self.store.insert_definition(&definition).await?;

        tracing::info!(
            definition_id = %definition.id,
            user_id = %user_id,
            frequency = %definition.frequency,
            interval = %definition.interval,
            start_date = %definition.start_date,
            correlation_id = ?context.correlation_id,
            "Recurring definition created"
        );

        Ok(definition)
    }
}
