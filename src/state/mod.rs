//! Run state machine
//!
//! Run states: QUEUED → RUNNING → {SUCCEEDED | FAILED}
//!
//! The persisted `run_state.json` records which phase a run reached, so a
//! workspace left behind by a fatal error tells the operator where it died.

mod run_state;

pub use run_state::{RunPhase, RunState, RunStateData, RunStateError, RUN_STATE_FILE};

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global sequence counter for ordering state updates
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Get the next sequence number for ordering
pub fn next_seq() -> u64 {
    SEQUENCE_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Get current UTC timestamp
pub fn now_rfc3339() -> DateTime<Utc> {
    Utc::now()
}
