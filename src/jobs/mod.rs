//! Scheduled Jobs
//!
//! Background sweep that materializes due recurring transactions on a fixed
//! cadence until shutdown.

mod sweep;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use sweep::{SweepDriver, SweepFailure, SweepReport};

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSchedulerConfig {
    /// Interval between recurring sweeps (default: 1 hour)
    pub sweep_interval: Duration,
    /// Occurrences materialized per definition per sweep (default: 24)
    pub max_catch_up_iterations: usize,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
            max_catch_up_iterations: 24,
        }
    }
}

/// Job Scheduler - runs the recurring sweep periodically
pub struct JobScheduler {
    sweep: Arc<SweepDriver>,
    config: JobSchedulerConfig,
    cancel: CancellationToken,
}

impl JobScheduler {
    /// Create with custom configuration.
    ///
    /// Cancelling `cancel` stops the loop and any sweep in progress between
    /// definitions.
    pub fn with_config(
        sweep: Arc<SweepDriver>,
        config: JobSchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sweep,
            config,
            cancel,
        }
    }

    /// Start the job scheduler in the background
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            "Job scheduler started"
        );

        let mut sweep_interval = interval(self.config.sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sweep_interval.tick() => {
                    self.run_once().await;
                }
            }
        }

        tracing::info!("Job scheduler stopped");
    }

    /// Run a single sweep for today (for manual trigger or testing)
    pub async fn run_once(&self) -> Option<SweepReport> {
        let today = Utc::now().date_naive();
        match self.sweep.run(today, &self.cancel).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Recurring sweep failed");
                None
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
