//! Command Handlers module
//!
//! Handlers for the management operations on recurring definitions. Each one
//! checks that the request user owns what it touches before writing to the
//! store.

mod commands;
mod create_handler;
mod delete_handler;
mod update_handler;

#[cfg(test)]
mod tests;

use uuid::Uuid;

use crate::domain::{DomainError, OperationContext, RecurringDefinition};
use crate::error::AppError;
use crate::store::SharedStore;

pub use commands::*;
pub use create_handler::CreateRecurringHandler;
pub use delete_handler::DeleteRecurringHandler;
pub use update_handler::UpdateRecurringHandler;

/// Request user from the operation context
pub fn require_user(context: &OperationContext) -> Result<Uuid, AppError> {
    context
        .request_user_id
        .ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))
}

/// Load a definition owned by `user_id`.
///
/// Definitions of other users are reported as not found.
pub async fn load_owned(
    store: &SharedStore,
    definition_id: Uuid,
    user_id: Uuid,
) -> Result<RecurringDefinition, AppError> {
    store
        .get_definition(definition_id)
        .await?
        .filter(|definition| definition.user_id == user_id)
        .ok_or(AppError::DefinitionNotFound(definition_id))
}

/// Reject accounts and categories that are missing or owned by someone else
pub(crate) async fn ensure_references(
    store: &SharedStore,
    user_id: Uuid,
    account_id: Option<Uuid>,
    category_id: Option<Uuid>,
) -> Result<(), AppError> {
    if let Some(account_id) = account_id {
        if !store.account_owned_by(account_id, user_id).await? {
            return Err(DomainError::AccountNotFound(account_id).into());
        }
    }
    if let Some(category_id) = category_id {
        if !store.category_owned_by(category_id, user_id).await? {
            return Err(DomainError::CategoryNotFound(category_id).into());
        }
    }
    Ok(())
}
