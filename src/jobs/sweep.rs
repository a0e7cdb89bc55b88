//! Sweep Driver
//!
//! Lists every due definition and hands each one to the catch-up controller.
//! A failing definition is logged and recorded in the report; the sweep moves
//! on to the next one and the failure is retried on the following tick.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::{CatchUpController, CatchUpStop, Materializer};
use crate::store::{DefinitionFilter, SharedStore, StoreError};

/// Per-definition failure inside a sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub definition_id: Uuid,
    pub error: String,
    pub retryable: bool,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub as_of: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Due definitions found at the start of the sweep
    pub definitions_due: usize,
    pub definitions_processed: usize,
    pub transactions_created: usize,
    /// Definitions that hit the catch-up bound and stay due
    pub deferred: Vec<Uuid>,
    /// Definitions that became inactive during this sweep
    pub exhausted: Vec<Uuid>,
    pub failures: Vec<SweepFailure>,
    /// Stopped early by shutdown
    pub cancelled: bool,
}

impl SweepReport {
    fn new(as_of: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            as_of,
            started_at: now,
            completed_at: now,
            definitions_due: 0,
            definitions_processed: 0,
            transactions_created: 0,
            deferred: Vec::new(),
            exhausted: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    /// True if the sweep created, deferred, exhausted or failed anything
    pub fn has_activity(&self) -> bool {
        self.transactions_created > 0
            || !self.deferred.is_empty()
            || !self.exhausted.is_empty()
            || !self.failures.is_empty()
    }
}

/// Periodic orchestrator over all users' due definitions
#[derive(Clone)]
pub struct SweepDriver {
    store: SharedStore,
    catch_up: CatchUpController,
}

impl SweepDriver {
    pub fn new(store: SharedStore, max_catch_up_iterations: usize) -> Self {
        let catch_up =
            CatchUpController::new(Materializer::new(store.clone()), max_catch_up_iterations);
        Self { store, catch_up }
    }

    /// Run one sweep for `as_of`.
    ///
    /// Only listing the due definitions can fail the sweep as a whole.
    /// Cancellation is honored between definitions; a definition already in
    /// progress finishes its current materialization.
    pub async fn run(
        &self,
        as_of: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::new(as_of);

        let due = self
            .store
            .list_definitions(&DefinitionFilter::due(as_of))
            .await?;
        report.definitions_due = due.len();

        for definition in due {
            if cancel.is_cancelled() {
                report.cancelled = true;
                tracing::info!(
                    remaining = report.definitions_due - report.definitions_processed,
                    "Sweep cancelled"
                );
                break;
            }

            report.definitions_processed += 1;
            match self.catch_up.run(definition, as_of).await {
                Ok(catch_up) => {
                    report.transactions_created += catch_up.materialized.len();
                    match catch_up.stop {
                        CatchUpStop::IterationLimit => report.deferred.push(catch_up.definition_id),
                        CatchUpStop::Exhausted => report.exhausted.push(catch_up.definition_id),
                        CatchUpStop::NotDue | CatchUpStop::AlreadyHandled => {}
                    }
                }
                Err(e) => {
                    tracing::error!(
                        definition_id = %e.definition_id,
                        materialized = e.materialized.len(),
                        error = %e.source,
                        "Recurring definition failed during sweep"
                    );
                    report.transactions_created += e.materialized.len();
                    report.failures.push(SweepFailure {
                        definition_id: e.definition_id,
                        error: e.source.to_string(),
                        retryable: e.source.is_retryable(),
                    });
                }
            }
        }

        report.completed_at = Utc::now();
        if report.has_activity() {
            tracing::info!(
                as_of = %as_of,
                definitions_processed = report.definitions_processed,
                transactions_created = report.transactions_created,
                deferred = report.deferred.len(),
                failures = report.failures.len(),
                "Recurring sweep completed"
            );
        }

        Ok(report)
    }
}
