//! Scheduled sync job.
//!
//! One job runs every registered synchronizer. Runs never overlap: a tick
//! that arrives while a run is in progress is skipped, not queued.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use cti_catalog_core::{format_category, ConsumerKey};
use cti_catalog_sync::{SyncOutcome, Synchronizer};

use crate::error::{CatalogError, Result};

/// Job type name registered with the scheduler.
pub const JOB_TYPE: &str = "consumer-sync-task";

/// Human-readable label for a job category.
pub fn display_name(category: &str) -> String {
    format_category(category)
}

/// Result of one consumer within a run.
#[derive(Debug)]
pub struct ConsumerReport {
    pub profile: String,
    pub key: ConsumerKey,
    pub result: Result<SyncOutcome>,
}

impl ConsumerReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of [`SyncJob::execute`].
#[derive(Debug)]
pub enum JobOutcome {
    /// Another run held the permit.
    Skipped,
    /// Every consumer was attempted.
    Completed(Vec<ConsumerReport>),
}

impl JobOutcome {
    pub fn reports(&self) -> &[ConsumerReport] {
        match self {
            JobOutcome::Skipped => &[],
            JobOutcome::Completed(reports) => reports,
        }
    }
}

/// Summary line for logs and the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs every synchronizer, one at a time, each on its own task.
pub struct SyncJob {
    synchronizers: Vec<Arc<Synchronizer>>,
    permit: Arc<Semaphore>,
}

impl SyncJob {
    pub fn new(synchronizers: Vec<Synchronizer>) -> Self {
        Self {
            synchronizers: synchronizers.into_iter().map(Arc::new).collect(),
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn synchronizers(&self) -> &[Arc<Synchronizer>] {
        &self.synchronizers
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.permit.available_permits() == 0
    }

    /// Run now, outside the schedule.
    pub async fn trigger(&self) -> JobOutcome {
        self.execute(&Uuid::new_v4().to_string()).await
    }

    /// Run every consumer once.
    ///
    /// Each consumer runs on its own task, so an error or a panic in one
    /// is recorded in its report and the next consumer still runs.
    pub async fn execute(&self, run_id: &str) -> JobOutcome {
        let Ok(_permit) = self.permit.clone().try_acquire_owned() else {
            warn!(run_id, job = JOB_TYPE, "Sync already running, skipping");
            return JobOutcome::Skipped;
        };
        info!(run_id, job = JOB_TYPE, consumers = self.synchronizers.len(), "Starting sync run");

        let mut reports = Vec::with_capacity(self.synchronizers.len());
        for synchronizer in &self.synchronizers {
            let profile = synchronizer.profile().name().to_owned();
            let key = synchronizer.profile().key().clone();
            let task = Arc::clone(synchronizer);

            let result = match tokio::spawn(async move { task.sync().await }).await {
                Ok(outcome) => outcome.map_err(CatalogError::from),
                Err(e) => {
                    error!(run_id, consumer = %profile, error = %e, "Sync task aborted");
                    Err(CatalogError::TaskFailed(e.to_string()))
                }
            };
            reports.push(ConsumerReport {
                profile,
                key,
                result,
            });
        }

        let summary = summarize(run_id, &reports);
        info!(
            run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Sync run finished"
        );
        JobOutcome::Completed(reports)
    }
}

fn summarize(run_id: &str, reports: &[ConsumerReport]) -> RunSummary {
    let succeeded = reports.iter().filter(|r| r.is_ok()).count();
    RunSummary {
        run_id: run_id.to_owned(),
        succeeded,
        failed: reports.len() - succeeded,
    }
}

impl JobOutcome {
    /// Summarize a completed run. `None` when skipped.
    pub fn summary(&self, run_id: &str) -> Option<RunSummary> {
        match self {
            JobOutcome::Skipped => None,
            JobOutcome::Completed(reports) => Some(summarize(run_id, reports)),
        }
    }
}
