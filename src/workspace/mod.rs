//! Per-run isolated workspace
//!
//! Every intermediate artifact of a run (alignment, read index, per-region
//! outputs, scheduler logs, run state) lives under
//! `<output_dir>/<run_id>_temp_dir`. Components receive the workspace path
//! explicitly; the process working directory is never changed.
//!
//! The workspace is removed only after a successful merge. On any fatal
//! error it stays on disk for inspection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

/// Suffix appended to the run id to name the workspace directory
pub const WORKSPACE_SUFFIX: &str = "_temp_dir";

/// Workspace errors
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("output directory {0} does not exist")]
    MissingOutputDir(PathBuf),

    #[error("workspace {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("invalid run id: {0}")]
    InvalidRunId(String),

    #[error("failed to create workspace {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove workspace {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Generate a new run_id using ULID (sortable, filesystem-safe).
///
/// Unlike a process id, a ULID is never recycled, so two runs cannot end up
/// sharing a scheduler job prefix.
pub fn generate_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// Validate a run identifier
///
/// Identifiers must be filesystem-safe and usable inside a SLURM job name:
/// `^[A-Za-z0-9][A-Za-z0-9_-]{9,63}$`. ULIDs (26 alphanumerics) satisfy this.
pub fn validate_run_id(id: &str) -> Result<(), WorkspaceError> {
    if id.len() < 10 || id.len() > 64 {
        return Err(WorkspaceError::InvalidRunId(format!(
            "run id must be 10-64 characters, got {}",
            id.len()
        )));
    }

    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => {
            return Err(WorkspaceError::InvalidRunId(
                "run id must start with an alphanumeric character".to_string(),
            ))
        }
    }

    if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-') {
        return Err(WorkspaceError::InvalidRunId(format!(
            "run id contains invalid character: {:?}",
            c
        )));
    }

    Ok(())
}

/// An allocated run workspace
#[derive(Debug)]
pub struct RunWorkspace {
    run_id: String,
    root: PathBuf,
}

impl RunWorkspace {
    /// Allocate a workspace for a freshly generated run id
    pub fn create(output_dir: &Path) -> Result<Self, WorkspaceError> {
        Self::create_with_id(output_dir, generate_run_id())
    }

    /// Allocate a workspace for a given run id.
    ///
    /// Fails if the directory already exists rather than sharing it.
    pub fn create_with_id(output_dir: &Path, run_id: String) -> Result<Self, WorkspaceError> {
        validate_run_id(&run_id)?;

        if !output_dir.is_dir() {
            return Err(WorkspaceError::MissingOutputDir(output_dir.to_path_buf()));
        }

        let root = output_dir.join(format!("{}{}", run_id, WORKSPACE_SUFFIX));
        match fs::create_dir(&root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::AlreadyExists(root));
            }
            Err(e) => return Err(WorkspaceError::Create { path: root, source: e }),
        }

        info!(run_id = %run_id, workspace = %root.display(), "created workspace");
        Ok(Self { run_id, root })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Remove the workspace and everything in it.
    ///
    /// Consumes the workspace: nothing may use it afterwards.
    pub fn teardown(self) -> Result<(), WorkspaceError> {
        fs::remove_dir_all(&self.root).map_err(|e| WorkspaceError::Remove {
            path: self.root.clone(),
            source: e,
        })?;
        info!(workspace = %self.root.display(), "removed workspace");
        Ok(())
    }
}
