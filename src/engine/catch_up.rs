//! Catch-up controller
//!
//! Replays the missed occurrences of one definition, oldest first, up to a
//! per-call bound. Anything left over stays due and is picked up by the next
//! sweep.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{MaterializedTransaction, RecurringDefinition};

use super::{EngineError, MaterializeOutcome, Materializer};

/// Why a catch-up run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUpStop {
    NotDue,
    Exhausted,
    AlreadyHandled,
    /// Bound reached while still due
    IterationLimit,
}

/// Entries created by one catch-up run and the reason it stopped
#[derive(Debug, Clone)]
pub struct CatchUpReport {
    pub definition_id: Uuid,
    pub materialized: Vec<MaterializedTransaction>,
    pub stop: CatchUpStop,
}

impl CatchUpReport {
    pub fn is_deferred(&self) -> bool {
        self.stop == CatchUpStop::IterationLimit
    }
}

/// A catch-up run that failed part way. Entries created before the failure
/// are committed and reported.
#[derive(Debug, thiserror::Error)]
#[error("Catch-up of definition {definition_id} failed: {source}")]
pub struct CatchUpError {
    pub definition_id: Uuid,
    pub materialized: Vec<MaterializedTransaction>,
    #[source]
    pub source: EngineError,
}

/// Drives the [`Materializer`] repeatedly for a single definition
#[derive(Clone)]
pub struct CatchUpController {
    materializer: Materializer,
    max_iterations: usize,
}

impl CatchUpController {
    /// `max_iterations` below one is raised to one.
    pub fn new(materializer: Materializer, max_iterations: usize) -> Self {
        Self {
            materializer,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Materialize every due occurrence of `definition` up to `as_of`, in
    /// ascending date order, stopping after `max_iterations` entries.
    pub async fn run(
        &self,
        mut definition: RecurringDefinition,
        as_of: NaiveDate,
    ) -> Result<CatchUpReport, CatchUpError> {
        let definition_id = definition.id;
        let mut materialized = Vec::new();

        let stop = loop {
            if materialized.len() >= self.max_iterations {
                if definition.is_due(as_of) {
                    tracing::warn!(
                        definition_id = %definition_id,
                        next_occurrence = %definition.next_occurrence_date,
                        max_iterations = self.max_iterations,
                        "Catch-up bound reached, deferring remaining occurrences"
                    );
                    break CatchUpStop::IterationLimit;
                }
                break stop_when_idle(&definition);
            }

            let outcome = match self.materializer.materialize(&definition, as_of).await {
                Ok(outcome) => outcome,
                Err(source) => {
                    return Err(CatchUpError {
                        definition_id,
                        materialized,
                        source,
                    })
                }
            };

            match outcome {
                MaterializeOutcome::Materialized(step) => {
                    definition.next_occurrence_date = step.next_occurrence_date;
                    definition.active = step.still_active;
                    materialized.push(step.transaction);
                }
                MaterializeOutcome::NotDue => break stop_when_idle(&definition),
                MaterializeOutcome::Exhausted => break CatchUpStop::Exhausted,
                MaterializeOutcome::AlreadyHandled => break CatchUpStop::AlreadyHandled,
            }
        };

        Ok(CatchUpReport {
            definition_id,
            materialized,
            stop,
        })
    }
}

fn stop_when_idle(definition: &RecurringDefinition) -> CatchUpStop {
    if definition.active {
        CatchUpStop::NotDue
    } else {
        CatchUpStop::Exhausted
    }
}
