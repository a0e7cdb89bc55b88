//! API Routes
//!
//! HTTP endpoint definitions.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{
    LedgerSummary, MaterializedTransaction, OperationContext, RecurringDefinition,
    TransactionFilter,
};
use crate::error::AppError;
use crate::handlers::{
    load_owned, require_user, CreateRecurringCommand, CreateRecurringHandler,
    DeleteRecurringHandler, UpdateRecurringCommand, UpdateRecurringHandler,
};
use crate::jobs::{SweepDriver, SweepReport};
use crate::store::{DefinitionFilter, SharedStore};

/// Upper bound for the upcoming-occurrence preview
const MAX_PREVIEW_COUNT: usize = 100;

/// Shared state of the API router
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub sweep: Arc<SweepDriver>,
}

impl AppState {
    pub fn new(store: SharedStore, max_catch_up_iterations: usize) -> Self {
        let sweep = Arc::new(SweepDriver::new(store.clone(), max_catch_up_iterations));
        Self { store, sweep }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct ListRecurringQuery {
    #[serde(default)]
    pub is_subscription: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RecurringListResponse {
    pub definitions: Vec<RecurringDefinition>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    #[serde(default = "default_preview_count")]
    pub count: usize,
}

fn default_preview_count() -> usize {
    5
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpcomingResponse {
    pub definition_id: Uuid,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

impl TransactionsQuery {
    fn into_filter(self, user_id: Uuid) -> Result<TransactionFilter, AppError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AppError::InvalidRequest(format!(
                    "from {} is after to {}",
                    from, to
                )));
            }
        }
        Ok(TransactionFilter {
            account_id: self.account_id,
            category_id: self.category_id,
            ..TransactionFilter::for_user(user_id).between(self.from, self.to)
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<MaterializedTransaction>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(flatten)]
    pub summary: LedgerSummary,
}

#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    /// Defaults to today (UTC); later dates are rejected
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Recurring definitions
        .route("/recurring", post(create_recurring).get(list_recurring))
        .route(
            "/recurring/:definition_id",
            get(get_recurring)
                .patch(update_recurring)
                .delete(delete_recurring),
        )
        .route("/recurring/:definition_id/upcoming", get(upcoming_occurrences))
        // Ledger readers
        .route("/transactions", get(list_transactions))
        .route("/transactions/summary", get(transaction_summary))
        // Admin
        .route("/admin/sweep", post(trigger_sweep))
}

// =========================================================================
// POST /recurring
// =========================================================================

/// Create a recurring definition
async fn create_recurring(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<CreateRecurringCommand>,
) -> Result<(StatusCode, Json<RecurringDefinition>), AppError> {
    let handler = CreateRecurringHandler::new(state.store);
    let definition = handler.execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(definition)))
}

// =========================================================================
// GET /recurring
// =========================================================================

/// List the request user's definitions
async fn list_recurring(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<ListRecurringQuery>,
) -> Result<Json<RecurringListResponse>, AppError> {
    let user_id = require_user(&context)?;
    let filter = DefinitionFilter::for_user(user_id).subscriptions(query.is_subscription);

    let definitions = state.store.list_definitions(&filter).await?;

    Ok(Json(RecurringListResponse {
        total: definitions.len(),
        definitions,
    }))
}

// =========================================================================
// GET /recurring/:definition_id
// =========================================================================

async fn get_recurring(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(definition_id): Path<Uuid>,
) -> Result<Json<RecurringDefinition>, AppError> {
    let user_id = require_user(&context)?;
    let definition = load_owned(&state.store, definition_id, user_id).await?;
    Ok(Json(definition))
}

// =========================================================================
// PATCH /recurring/:definition_id
// =========================================================================

async fn update_recurring(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(definition_id): Path<Uuid>,
    Json(command): Json<UpdateRecurringCommand>,
) -> Result<Json<RecurringDefinition>, AppError> {
    let handler = UpdateRecurringHandler::new(state.store);
    let definition = handler.execute(definition_id, command, &context).await?;
    Ok(Json(definition))
}

// =========================================================================
// DELETE /recurring/:definition_id
// =========================================================================

/// Delete a definition; its ledger entries are kept
async fn delete_recurring(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(definition_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let handler = DeleteRecurringHandler::new(state.store);
    handler.execute(definition_id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// GET /recurring/:definition_id/upcoming
// =========================================================================

/// Preview the next dates that will be materialized
async fn upcoming_occurrences(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(definition_id): Path<Uuid>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<UpcomingResponse>, AppError> {
    if query.count > MAX_PREVIEW_COUNT {
        return Err(AppError::InvalidRequest(format!(
            "count must be at most {}",
            MAX_PREVIEW_COUNT
        )));
    }

    let user_id = require_user(&context)?;
    let definition = load_owned(&state.store, definition_id, user_id).await?;

    Ok(Json(UpcomingResponse {
        definition_id,
        dates: definition.pending_occurrences().take(query.count).collect(),
    }))
}

// =========================================================================
// GET /transactions
// =========================================================================

/// Ledger entries of the request user
async fn list_transactions(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionListResponse>, AppError> {
    let user_id = require_user(&context)?;
    let filter = query.into_filter(user_id)?;

    let transactions = state.store.list_transactions(&filter).await?;

    Ok(Json(TransactionListResponse {
        total: transactions.len(),
        transactions,
    }))
}

// =========================================================================
// GET /transactions/summary
// =========================================================================

/// Income and expense totals for a period
async fn transaction_summary(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let user_id = require_user(&context)?;
    let filter = TransactionsQuery {
        from: query.from,
        to: query.to,
        account_id: None,
        category_id: None,
    }
    .into_filter(user_id)?;

    let transactions = state.store.list_transactions(&filter).await?;

    Ok(Json(SummaryResponse {
        from: query.from,
        to: query.to,
        summary: LedgerSummary::from_transactions(&transactions),
    }))
}

// =========================================================================
// POST /admin/sweep
// =========================================================================

/// Run a sweep now. May overlap the scheduled one.
///
/// `as_of` may replay a past date but never reach into the future.
async fn trigger_sweep(
    State(state): State<AppState>,
    Query(query): Query<SweepQuery>,
) -> Result<Json<SweepReport>, AppError> {
    let today = Utc::now().date_naive();
    let as_of = query.as_of.unwrap_or(today);
    if as_of > today {
        return Err(AppError::InvalidRequest(format!(
            "as_of {} is after today ({})",
            as_of, today
        )));
    }

    let report = state.sweep.run(as_of, &CancellationToken::new()).await?;
    Ok(Json(report))
}
