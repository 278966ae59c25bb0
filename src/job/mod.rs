//! Job submission
//!
//! One scheduler job per region. The job name is the run prefix followed by
//! the region identifier, which is what the monitor later searches the queue
//! for. The consensus command is built as an argument vector.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use polish_region::Region;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ConsensusSettings, SlurmSettings};
use crate::process::ToolCommand;
use crate::scheduler::{Scheduler, SchedulerError, SubmitReceipt};

/// Schema identifier for jobs.json
pub const SCHEMA_ID: &str = "nanopolish-slurm/jobs@1";

/// Submission manifest file name inside the workspace
pub const JOBS_FILE: &str = "jobs.json";

/// Resources requested for each consensus job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub partition: String,
    pub nodes: u32,
    pub ntasks: u32,
    pub cpus_per_task: u32,
    pub mem_mb: u64,
    pub time: String,
}

impl ResourceSpec {
    pub fn from_settings(settings: &SlurmSettings) -> Self {
        Self {
            partition: settings.partition.clone(),
            nodes: 1,
            ntasks: 1,
            cpus_per_task: settings.cpus_per_task,
            mem_mb: settings.mem_mb,
            time: settings.time.clone(),
        }
    }
}

/// Inputs shared by every per-region consensus invocation
#[derive(Debug, Clone)]
pub struct ConsensusCommand {
    pub nanopolish: PathBuf,
    pub reads: PathBuf,
    pub alignment: PathBuf,
    pub assembly: PathBuf,
    pub threads: u32,
    pub min_candidate_frequency: f64,
}

impl ConsensusCommand {
    pub fn from_settings(
        nanopolish: PathBuf,
        reads: PathBuf,
        alignment: PathBuf,
        assembly: PathBuf,
        settings: &ConsensusSettings,
    ) -> Self {
        Self {
            nanopolish,
            reads,
            alignment,
            assembly,
            threads: settings.threads,
            min_candidate_frequency: settings.min_candidate_frequency,
        }
    }

    /// `nanopolish variants --consensus` for one region
    pub fn for_region(&self, region: &Region) -> ToolCommand {
        ToolCommand::new(&self.nanopolish)
            .args(["variants", "--consensus"])
            .arg(region.output_file_name())
            .arg("-w")
            .arg(region.id())
            .arg("-r")
            .arg(&self.reads)
            .arg("-b")
            .arg(&self.alignment)
            .arg("-g")
            .arg(&self.assembly)
            .arg("-t")
            .arg(self.threads.to_string())
            .arg("--min-candidate-frequency")
            .arg(self.min_candidate_frequency.to_string())
    }
}

/// A job bound to one region
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// `prefix + region`
    pub name: String,
    pub region: Region,
    pub command: ToolCommand,
    /// Where the job's output is expected to appear
    pub output: PathBuf,
    pub resources: ResourceSpec,
    /// Directory the job runs in (the run workspace)
    pub workdir: PathBuf,
}

impl JobSpec {
    pub fn new(
        prefix: &str,
        region: Region,
        consensus: &ConsensusCommand,
        resources: ResourceSpec,
        workdir: &Path,
    ) -> Self {
        Self {
            name: job_name(prefix, &region),
            command: consensus.for_region(&region).current_dir(workdir),
            output: workdir.join(region.output_file_name()),
            region,
            resources,
            workdir: workdir.to_path_buf(),
        }
    }
}

/// Scheduler job name for a region
pub fn job_name(prefix: &str, region: &Region) -> String {
    format!("{}{}", prefix, region.id())
}

/// Errors for job submission
#[derive(Debug, Error)]
pub enum JobError {
    /// A rejected submission aborts the batch. Jobs already accepted stay
    /// queued and must be cancelled by the operator.
    #[error("{error} ({submitted} of {total} jobs were accepted before the failure)")]
    Submission {
        submitted: usize,
        total: usize,
        #[source]
        error: SchedulerError,
    },

    #[error("failed to write jobs.json: {0}")]
    Manifest(#[from] io::Error),

    #[error("failed to serialize jobs.json: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-job line of jobs.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub job_name: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub output: PathBuf,
}

/// Submission manifest artifact (jobs.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionManifest {
    pub schema_id: String,
    pub job_prefix: String,
    pub jobs: Vec<SubmissionRecord>,
}

impl SubmissionManifest {
    pub fn write_to_workspace(&self, workspace: &Path) -> Result<(), JobError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(workspace.join(JOBS_FILE), json)?;
        Ok(())
    }
}

/// Everything the submitter needs besides the regions
#[derive(Debug, Clone)]
pub struct SubmitContext<'a> {
    pub prefix: &'a str,
    pub consensus: &'a ConsensusCommand,
    pub resources: &'a ResourceSpec,
    pub workdir: &'a Path,
}

/// Submit one job per region, in region order.
///
/// Stops at the first rejection; a partially submitted batch never reaches
/// monitoring.
pub fn submit_all(
    scheduler: &dyn Scheduler,
    regions: &[Region],
    ctx: &SubmitContext<'_>,
) -> Result<(Vec<JobSpec>, SubmissionManifest), JobError> {
    info!(count = regions.len(), prefix = ctx.prefix, "Launching SLURM jobs");

    let mut jobs = Vec::with_capacity(regions.len());
    let mut records = Vec::with_capacity(regions.len());

    for region in regions {
        let job = JobSpec::new(
            ctx.prefix,
            region.clone(),
            ctx.consensus,
            ctx.resources.clone(),
            ctx.workdir,
        );

        let SubmitReceipt { job_name, job_id } =
            scheduler.submit(&job).map_err(|error| JobError::Submission {
                submitted: jobs.len(),
                total: regions.len(),
                error,
            })?;

        info!(job = %job_name, job_id = ?job_id, "submitted");
        records.push(SubmissionRecord {
            job_name,
            region: region.id().to_string(),
            job_id,
            output: job.output.clone(),
        });
        jobs.push(job);
    }

    let manifest = SubmissionManifest {
        schema_id: SCHEMA_ID.to_string(),
        job_prefix: ctx.prefix.to_string(),
        jobs: records,
    };
    Ok((jobs, manifest))
}
