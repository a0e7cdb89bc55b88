//! Handler tests against the in-memory store

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::domain::{
    DefinitionChanges, DomainError, Frequency, OperationContext, TransactionFilter,
};
use crate::engine::{CatchUpController, Materializer};
use crate::error::AppError;
use crate::handlers::{
    load_owned, CreateRecurringCommand, CreateRecurringHandler, DeleteRecurringHandler,
    UpdateRecurringCommand, UpdateRecurringHandler,
};
use crate::store::{InMemoryRecurringStore, RecurringStore, SharedStore};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Fixture {
    memory: Arc<InMemoryRecurringStore>,
    store: SharedStore,
    user_id: Uuid,
    account_id: Uuid,
    context: OperationContext,
}

fn fixture() -> Fixture {
    let memory = Arc::new(InMemoryRecurringStore::new());
    let user_id = Uuid::new_v4();
    let account_id = memory.add_account(user_id);
    Fixture {
        store: memory.clone(),
        memory,
        user_id,
        account_id,
        context: OperationContext::new().with_request_user(user_id),
    }
}

fn rent(account_id: Uuid) -> CreateRecurringCommand {
    CreateRecurringCommand::new("Rent", "-50", "MONTHLY", date(2024, 1, 31), account_id)
}

// =========================================================================
// Create
// =========================================================================

#[tokio::test]
async fn test_create_stores_definition() {
    let f = fixture();
    let handler = CreateRecurringHandler::new(f.store.clone());

    let definition = handler.execute(rent(f.account_id), &f.context).await.unwrap();

    assert_eq!(definition.user_id, f.user_id);
    assert_eq!(definition.amount.value(), dec!(-50));
    assert_eq!(definition.next_occurrence_date, date(2024, 1, 31));
    assert!(definition.active);

    let stored = f.store.get_definition(definition.id).await.unwrap();
    assert_eq!(stored, Some(definition));
}

#[tokio::test]
async fn test_create_requires_request_user() {
    let f = fixture();
    let handler = CreateRecurringHandler::new(f.store.clone());

    let result = handler.execute(rent(f.account_id), &OperationContext::new()).await;

    assert!(matches!(result, Err(AppError::MissingHeader(_))));
}

#[tokio::test]
async fn test_create_rejects_foreign_account() {
    let f = fixture();
    let other_account = f.memory.add_account(Uuid::new_v4());
    let handler = CreateRecurringHandler::new(f.store.clone());

    let result = handler.execute(rent(other_account), &f.context).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::AccountNotFound(id))) if id == other_account
    ));
}

#[tokio::test]
async fn test_create_rejects_unknown_category() {
    let f = fixture();
    let handler = CreateRecurringHandler::new(f.store.clone());

    let result = handler
        .execute(rent(f.account_id).with_category(Uuid::new_v4()), &f.context)
        .await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::CategoryNotFound(_)))
    ));
}

#[tokio::test]
async fn test_create_rejects_end_before_start() {
    let f = fixture();
    let handler = CreateRecurringHandler::new(f.store.clone());

    let result = handler
        .execute(rent(f.account_id).with_end_date(date(2023, 12, 31)), &f.context)
        .await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::InvalidDateRange { .. }))
    ));
}

// =========================================================================
// Update
// =========================================================================

#[tokio::test]
async fn test_update_changes_amount_only() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(rent(f.account_id), &f.context)
        .await
        .unwrap();

    let command = UpdateRecurringCommand {
        amount: Some("-55.25".to_string()),
        ..Default::default()
    };
    let updated = UpdateRecurringHandler::new(f.store.clone())
        .execute(created.id, command, &f.context)
        .await
        .unwrap();

    assert_eq!(updated.amount.value(), dec!(-55.25));
    assert_eq!(updated.next_occurrence_date, created.next_occurrence_date);
    assert_eq!(updated.frequency, created.frequency);
}

#[tokio::test]
async fn test_stale_edit_is_rejected_by_store() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(rent(f.account_id), &f.context)
        .await
        .unwrap();

    // Two edits based on the same read: the second one must not overwrite the first
    let first = created
        .with_changes(
            DefinitionChanges {
                description: Some("Flat rent".to_string()),
                ..Default::default()
            },
            false,
            chrono::Utc::now(),
        )
        .unwrap();
    let second = created
        .with_changes(
            DefinitionChanges {
                frequency: Some(Frequency::Weekly),
                ..Default::default()
            },
            false,
            chrono::Utc::now(),
        )
        .unwrap();
    tokio_test::assert_ok!(
        f.store
            .update_definition(&first, created.next_occurrence_date, created.version)
            .await
    );
    let result = f
        .store
        .update_definition(&second, created.next_occurrence_date, created.version)
        .await
        .map_err(AppError::from);
    assert!(matches!(result, Err(AppError::VersionConflict)));

    // The handler itself reads fresh state, so a sequential edit succeeds
    let command = UpdateRecurringCommand {
        interval: Some(2),
        ..Default::default()
    };
    let updated = UpdateRecurringHandler::new(f.store.clone())
        .execute(created.id, command, &f.context)
        .await
        .unwrap();
    assert_eq!(updated.description, "Flat rent");
    assert_eq!(updated.frequency, Frequency::Monthly);
    assert_eq!(updated.version, created.version + 2);
}

#[tokio::test]
async fn test_start_date_round_trip_never_rewinds_recorded_history() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(
            CreateRecurringCommand::new("Gym", "-30", "MONTHLY", date(2024, 1, 1), f.account_id),
            &f.context,
        )
        .await
        .unwrap();
    let catch_up = CatchUpController::new(Materializer::new(f.store.clone()), 24);
    let as_of = date(2024, 3, 15);
    catch_up.run(created.clone(), as_of).await.unwrap();

    let handler = UpdateRecurringHandler::new(f.store.clone());
    for start in [date(2024, 4, 1), date(2024, 1, 1)] {
        let command = UpdateRecurringCommand {
            start_date: Some(start),
            ..Default::default()
        };
        let updated = handler.execute(created.id, command, &f.context).await.unwrap();
        assert_eq!(updated.next_occurrence_date, date(2024, 4, 1), "start {}", start);
    }

    let stored = load_owned(&f.store, created.id, f.user_id).await.unwrap();
    let report = catch_up.run(stored, as_of).await.unwrap();
    assert!(report.materialized.is_empty());

    let dates: Vec<NaiveDate> = f
        .store
        .list_transactions(&TransactionFilter::for_definition(created.id))
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.date)
        .collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]);
}

#[tokio::test]
async fn test_start_date_moves_cursor_back_without_history() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(rent(f.account_id), &f.context)
        .await
        .unwrap();
    let handler = UpdateRecurringHandler::new(f.store.clone());

    for start in [date(2024, 3, 31), date(2024, 1, 15)] {
        let command = UpdateRecurringCommand {
            start_date: Some(start),
            ..Default::default()
        };
        let updated = handler.execute(created.id, command, &f.context).await.unwrap();
        assert_eq!(updated.next_occurrence_date, start);
    }
}

#[tokio::test]
async fn test_update_end_date_before_cursor_deactivates() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(rent(f.account_id), &f.context)
        .await
        .unwrap();
    CatchUpController::new(Materializer::new(f.store.clone()), 10)
        .run(created.clone(), date(2024, 3, 31))
        .await
        .unwrap();

    let command = UpdateRecurringCommand {
        end_date: Some(Some(date(2024, 3, 15))),
        ..Default::default()
    };
    let updated = UpdateRecurringHandler::new(f.store.clone())
        .execute(created.id, command, &f.context)
        .await
        .unwrap();

    assert_eq!(updated.next_occurrence_date, date(2024, 4, 30));
    assert!(!updated.active);
}

#[tokio::test]
async fn test_update_hides_other_users_definitions() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(rent(f.account_id), &f.context)
        .await
        .unwrap();

    let intruder = OperationContext::new().with_request_user(Uuid::new_v4());
    let result = UpdateRecurringHandler::new(f.store.clone())
        .execute(created.id, UpdateRecurringCommand::default(), &intruder)
        .await;

    assert!(matches!(result, Err(AppError::DefinitionNotFound(_))));
}

// =========================================================================
// Delete
// =========================================================================

#[tokio::test]
async fn test_delete_keeps_history() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(rent(f.account_id), &f.context)
        .await
        .unwrap();
    CatchUpController::new(Materializer::new(f.store.clone()), 10)
        .run(created.clone(), date(2024, 2, 29))
        .await
        .unwrap();

    DeleteRecurringHandler::new(f.store.clone())
        .execute(created.id, &f.context)
        .await
        .unwrap();

    assert!(matches!(
        load_owned(&f.store, created.id, f.user_id).await,
        Err(AppError::DefinitionNotFound(_))
    ));
    let history = f
        .store
        .list_transactions(&TransactionFilter::for_definition(created.id))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(f.memory.transaction_count(), 2);
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let f = fixture();
    let created = CreateRecurringHandler::new(f.store.clone())
        .execute(rent(f.account_id), &f.context)
        .await
        .unwrap();
    let handler = DeleteRecurringHandler::new(f.store.clone());

    tokio_test::assert_ok!(handler.execute(created.id, &f.context).await);
    let second = handler.execute(created.id, &f.context).await;

    assert!(matches!(second, Err(AppError::DefinitionNotFound(_))));
}
