//! Batch scheduler abstraction
//!
//! Two operations are all the orchestrator needs from a scheduler: accept a
//! job, and list what is still queued or running. `SlurmScheduler` drives
//! `sbatch`/`squeue`; `MockScheduler` simulates a queue in-process for tests.

mod mock;
mod slurm;

pub use mock::{MockConfig, MockScheduler};
pub use slurm::{SlurmScheduler, WRAPPER_SCRIPT};

use serde::{Deserialize, Serialize};

use crate::job::JobSpec;
use crate::process::ProcessError;

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("submission of {job} rejected: {source}")]
    Rejected {
        job: String,
        #[source]
        source: ProcessError,
    },

    #[error("queue query failed: {0}")]
    QueryFailed(#[source] ProcessError),

    #[error("unparseable queue line {line:?}")]
    MalformedQueueLine { line: String },

    #[error("scheduler setup failed: {0}")]
    Setup(String),
}

/// What the scheduler said when it accepted a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_name: String,

    /// Scheduler job id, when the submit output carried one
    pub job_id: Option<String>,
}

/// One row of the scheduler queue listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub job_name: String,
    pub job_id: String,
    pub state: String,
}

impl QueueEntry {
    pub fn new(job_name: impl Into<String>, job_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            job_id: job_id.into(),
            state: state.into(),
        }
    }

    /// Whether this entry belongs to the run owning `prefix`
    pub fn belongs_to(&self, prefix: &str) -> bool {
        self.job_name.contains(prefix)
    }
}

/// A batch scheduler
pub trait Scheduler: Send + Sync {
    /// Hand a job to the scheduler. Success means accepted into the queue,
    /// nothing more.
    fn submit(&self, job: &JobSpec) -> Result<SubmitReceipt, SchedulerError>;

    /// List every job visible to this user that is still queued or running
    fn queue(&self) -> Result<Vec<QueueEntry>, SchedulerError>;
}
