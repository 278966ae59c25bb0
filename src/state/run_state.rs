//! Run state machine
//!
//! Run states: QUEUED → RUNNING → {SUCCEEDED | FAILED}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::{next_seq, now_rfc3339};

/// Schema version for run_state.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "nanopolish-slurm/run_state@1";

/// File name inside the workspace
pub const RUN_STATE_FILE: &str = "run_state.json";

/// Run state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Workspace allocated, nothing started
    Queued,
    /// Pipeline is executing
    Running,
    /// Final assembly written
    Succeeded,
    /// A fatal error stopped the run
    Failed,
}

impl RunState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: RunState) -> bool {
        matches!(
            (self, target),
            (RunState::Queued, RunState::Running)
                | (RunState::Queued, RunState::Failed)
                | (RunState::Running, RunState::Succeeded)
                | (RunState::Running, RunState::Failed)
        )
    }
}

/// Pipeline phase a running run is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Planning,
    Aligning,
    Indexing,
    Submitting,
    Monitoring,
    Filling,
    Merging,
}

/// Run state artifact data (run_state.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStateData {
    pub schema_version: u32,

    pub schema_id: String,

    pub run_id: String,

    pub state: RunState,

    /// Last phase entered (kept after a failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RunPhase>,

    /// Scheduler job-name prefix of this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_prefix: Option<String>,

    /// Number of regions planned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_count: Option<usize>,

    /// Regions masked with placeholder output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incomplete_regions: Vec<String>,

    /// Error message of a failed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Monotonic sequence counter for ordering
    pub seq: u64,
}

/// Errors for run state operations
#[derive(Debug, thiserror::Error)]
pub enum RunStateError {
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RunStateData {
    /// Create a new run in QUEUED state
    pub fn new(run_id: String) -> Self {
        let now = now_rfc3339();
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            run_id,
            state: RunState::Queued,
            phase: None,
            job_prefix: None,
            region_count: None,
            incomplete_regions: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            seq: next_seq(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = now_rfc3339();
        self.seq = next_seq();
    }

    /// Transition to a new state
    pub fn transition(&mut self, new_state: RunState) -> Result<(), RunStateError> {
        if !self.state.can_transition_to(new_state) {
            return Err(RunStateError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }
        self.state = new_state;
        self.touch();
        Ok(())
    }

    /// Start the run (QUEUED → RUNNING)
    pub fn start(&mut self) -> Result<(), RunStateError> {
        self.transition(RunState::Running)
    }

    /// Mark run as succeeded
    pub fn succeed(&mut self) -> Result<(), RunStateError> {
        self.transition(RunState::Succeeded)
    }

    /// Mark run as failed, recording the error
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), RunStateError> {
        self.transition(RunState::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn enter_phase(&mut self, phase: RunPhase) {
        self.phase = Some(phase);
        self.touch();
    }

    pub fn set_job_prefix(&mut self, prefix: String) {
        self.job_prefix = Some(prefix);
        self.touch();
    }

    pub fn set_region_count(&mut self, count: usize) {
        self.region_count = Some(count);
        self.touch();
    }

    pub fn set_incomplete_regions(&mut self, regions: Vec<String>) {
        self.incomplete_regions = regions;
        self.touch();
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write atomically to file (write-then-rename)
    pub fn write_to_file(&self, path: &Path) -> Result<(), RunStateError> {
        let json = self.to_json()?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Load from file
    pub fn from_file(path: &Path) -> Result<Self, RunStateError> {
        let json = fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// Write into a workspace as run_state.json
    pub fn write_to_workspace(&self, workspace: &Path) -> Result<(), RunStateError> {
        self.write_to_file(&workspace.join(RUN_STATE_FILE))
    }
}
