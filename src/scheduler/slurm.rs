//! SLURM scheduler via `sbatch` and `squeue`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{QueueEntry, Scheduler, SchedulerError, SubmitReceipt};
use crate::config::SlurmSettings;
use crate::job::JobSpec;
use crate::process::ToolCommand;

/// Batch script written into each workspace.
///
/// It runs its arguments verbatim, so the consensus command line reaches the
/// compute node as an argument vector and is never re-parsed by a shell.
pub const WRAPPER_SCRIPT: &str = "consensus_job.sh";

const WRAPPER_BODY: &str = "#!/bin/sh\nexec \"$@\"\n";

/// Field separator requested from `squeue --format`
const QUEUE_SEPARATOR: char = '|';

/// SLURM-backed scheduler for one run
#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    sbatch: String,
    squeue: String,
    user: Option<String>,
    wrapper: PathBuf,
}

impl SlurmScheduler {
    /// Set up a scheduler whose jobs run through the wrapper script in
    /// `workspace`, writing the script if needed.
    pub fn for_workspace(settings: &SlurmSettings, workspace: &Path) -> Result<Self, SchedulerError> {
        let wrapper = workspace.join(WRAPPER_SCRIPT);
        write_wrapper(&wrapper)?;
        Ok(Self {
            sbatch: settings.sbatch.clone(),
            squeue: settings.squeue.clone(),
            user: settings.user.clone(),
            wrapper,
        })
    }

    /// The `sbatch` invocation for `job`
    pub fn submit_command(&self, job: &JobSpec) -> ToolCommand {
        let res = &job.resources;
        let log_pattern = job.workdir.join("slurm-%j.out");

        ToolCommand::new(&self.sbatch)
            .arg("-p")
            .arg(&res.partition)
            .arg(format!("--nodes={}", res.nodes))
            .arg(format!("--job-name={}", job.name))
            .arg(format!("--ntasks={}", res.ntasks))
            .arg(format!("--cpus-per-task={}", res.cpus_per_task))
            .arg(format!("--mem={}", res.mem_mb))
            .arg(format!("--time={}", res.time))
            .arg(format!("--chdir={}", job.workdir.display()))
            .arg(format!("--output={}", log_pattern.display()))
            .arg(&self.wrapper)
            .arg(job.command.program())
            .args(job.command.get_args())
    }

    /// The `squeue` invocation listing name, id and state
    pub fn queue_command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.squeue).args(["--noheader", "--format=%j|%i|%T"]);
        if let Some(ref user) = self.user {
            cmd = cmd.arg(format!("--user={}", user));
        }
        cmd
    }
}

fn write_wrapper(path: &Path) -> Result<(), SchedulerError> {
    fs::write(path, WRAPPER_BODY)
        .map_err(|e| SchedulerError::Setup(format!("cannot write {}: {}", path.display(), e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| SchedulerError::Setup(format!("cannot chmod {}: {}", path.display(), e)))?;
    }

    Ok(())
}

/// Extract the job id from `Submitted batch job <id>`
pub(crate) fn parse_submit_output(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Submitted batch job ")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

/// Parse `%j|%i|%T` rows. The name is split off last so it may contain the
/// separator itself.
pub(crate) fn parse_queue_output(stdout: &str) -> Result<Vec<QueueEntry>, SchedulerError> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.rsplitn(3, QUEUE_SEPARATOR);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(state), Some(id), Some(name)) => {
                    Ok(QueueEntry::new(name.trim(), id.trim(), state.trim()))
                }
                _ => Err(SchedulerError::MalformedQueueLine {
                    line: line.to_string(),
                }),
            }
        })
        .collect()
}

impl Scheduler for SlurmScheduler {
    fn submit(&self, job: &JobSpec) -> Result<SubmitReceipt, SchedulerError> {
        let command = self.submit_command(job);
        let stdout = command
            .output_text()
            .map_err(|source| SchedulerError::Rejected {
                job: job.name.clone(),
                source,
            })?;

        let job_id = parse_submit_output(&stdout);
        debug!(job = %job.name, job_id = ?job_id, "submitted");
        Ok(SubmitReceipt {
            job_name: job.name.clone(),
            job_id,
        })
    }

    fn queue(&self) -> Result<Vec<QueueEntry>, SchedulerError> {
        let stdout = self
            .queue_command()
            .output_text()
            .map_err(SchedulerError::QueryFailed)?;
        parse_queue_output(&stdout)
    }
}
