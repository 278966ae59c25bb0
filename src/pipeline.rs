//! Pipeline orchestration
//!
//! One run, start to finish:
//! - Allocate the run workspace and record config and state in it
//! - Plan regions
//! - Align, sort and index reads; build the read index
//! - Submit one consensus job per region
//! - Wait until none of this run's jobs are queued
//! - Mask regions that produced nothing
//! - Merge per-region outputs in coordinate order
//!
//! Any fatal error stops the run where it is. The workspace is then left in
//! place with `run_state.json` marked FAILED; on success it is removed.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ConfigError, EffectiveConfig, PolishSettings, EFFECTIVE_CONFIG_FILE};
use crate::filler::{fill_incomplete, FillError};
use crate::install::NanopolishInstall;
use crate::job::{submit_all, ConsensusCommand, JobError, ResourceSpec, SubmitContext};
use crate::merge::{discover_outputs, final_assembly_path, order_outputs, MergeError, Merger};
use crate::monitor::{JobMonitor, MonitorConfig, MonitorError, MonitorReport};
use crate::planner::{makerange_command, plan_ranges, PlannerError};
use crate::prepare::{Preparation, PrepareError};
use crate::scheduler::{Scheduler, SchedulerError, SlurmScheduler};
use crate::state::{RunPhase, RunStateData, RunStateError};
use crate::workspace::{RunWorkspace, WorkspaceError};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("run state error: {0}")]
    State(#[from] RunStateError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("range planning failed: {0}")]
    Planner(#[from] PlannerError),

    #[error("preparation failed: {0}")]
    Prepare(#[from] PrepareError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("job submission failed: {0}")]
    Submission(#[from] JobError),

    #[error("monitoring failed: {0}")]
    Monitor(#[from] MonitorError),

    #[error("filling failed: {0}")]
    Fill(#[from] FillError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Input(_) => 1,
            PipelineError::Workspace(_) => 1,
            PipelineError::State(_) => 1,
            PipelineError::Io(_) => 1,
            PipelineError::Planner(_) => 10,
            PipelineError::Prepare(_) => 20,
            PipelineError::Scheduler(SchedulerError::QueryFailed(_))
            | PipelineError::Scheduler(SchedulerError::MalformedQueueLine { .. }) => 40,
            PipelineError::Scheduler(_) => 30,
            PipelineError::Submission(JobError::Submission { .. }) => 30,
            PipelineError::Submission(_) => 1,
            PipelineError::Monitor(_) => 40,
            PipelineError::Fill(_) => 50,
            PipelineError::Merge(_) => 60,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// The positional inputs of one run
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub assembly: PathBuf,
    pub reads: PathBuf,
    /// Raw signal (fast5) directory
    pub signal_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Nanopolish installation directory
    pub nanopolish_dir: PathBuf,
    /// Alignment threads
    pub threads: u32,
}

impl RunInputs {
    /// Reject inputs no run could use, and anchor relative paths to the
    /// current directory: collaborators run inside the workspace.
    fn resolve(&self) -> PipelineResult<Self> {
        if self.threads == 0 {
            return Err(PipelineError::Input("thread count must be greater than 0".to_string()));
        }
        let cwd = std::env::current_dir()?;
        let anchor = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            }
        };
        Ok(Self {
            assembly: anchor(&self.assembly),
            reads: anchor(&self.reads),
            signal_dir: anchor(&self.signal_dir),
            output_dir: anchor(&self.output_dir),
            nanopolish_dir: anchor(&self.nanopolish_dir),
            threads: self.threads,
        })
    }
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub final_assembly: PathBuf,
    pub region_count: usize,
    /// Regions masked with the filler symbol
    pub incomplete_regions: Vec<String>,
    pub monitor: MonitorReport,
}

type SleepFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// Pipeline execution context
pub struct Pipeline {
    config: EffectiveConfig,
    settings: PolishSettings,
    /// Shared scheduler; SLURM per workspace when unset
    scheduler: Option<Arc<dyn Scheduler>>,
    /// Sleep between queue checks; a real sleep when unset
    sleep: Option<SleepFn>,
}

impl Pipeline {
    /// Create a pipeline from a loaded configuration
    pub fn new(config: EffectiveConfig) -> PipelineResult<Self> {
        let settings = config.settings()?;
        Ok(Self {
            config,
            settings,
            scheduler: None,
            sleep: None,
        })
    }

    /// Use `scheduler` instead of SLURM
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Replace the sleep between queue checks
    pub fn with_sleep<F>(mut self, sleep: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleep = Some(Arc::new(sleep));
        self
    }

    /// Execute one run
    pub fn run(&self, inputs: &RunInputs) -> PipelineResult<RunOutcome> {
        let inputs = inputs.resolve()?;
        let workspace = RunWorkspace::create(&inputs.output_dir)?;

        let mut state = RunStateData::new(workspace.run_id().to_string());
        state.start()?;
        state.write_to_workspace(workspace.path())?;

        match self.execute(&workspace, &mut state, &inputs) {
            Ok(outcome) => {
                state.succeed()?;
                state.write_to_workspace(workspace.path())?;
                workspace.teardown()?;
                info!(final_assembly = %outcome.final_assembly.display(), "Finished!");
                Ok(outcome)
            }
            Err(e) => {
                if let Err(state_err) = state.fail(e.to_string()) {
                    warn!(error = %state_err, "could not mark run failed");
                } else if let Err(write_err) = state.write_to_workspace(workspace.path()) {
                    warn!(error = %write_err, "could not record failed run state");
                }
                error!(
                    run_id = workspace.run_id(),
                    workspace = %workspace.path().display(),
                    phase = ?state.phase,
                    "run failed; workspace kept for inspection"
                );
                Err(e)
            }
        }
    }

    fn scheduler_for(&self, workspace: &Path) -> PipelineResult<Arc<dyn Scheduler>> {
        match self.scheduler {
            Some(ref scheduler) => Ok(Arc::clone(scheduler)),
            None => {
                let slurm: Arc<dyn Scheduler> =
                    Arc::new(SlurmScheduler::for_workspace(&self.settings.slurm, workspace)?);
                Ok(slurm)
            }
        }
    }

    fn enter(&self, state: &mut RunStateData, workspace: &Path, phase: RunPhase) -> PipelineResult<()> {
        state.enter_phase(phase);
        state.write_to_workspace(workspace)?;
        Ok(())
    }

    fn execute(
        &self,
        workspace: &RunWorkspace,
        state: &mut RunStateData,
        inputs: &RunInputs,
    ) -> PipelineResult<RunOutcome> {
        let settings = &self.settings;
        let dir = workspace.path();
        let run_id = workspace.run_id();

        self.config
            .clone()
            .with_run_id(run_id.to_string())
            .write_to_file(&workspace.join(EFFECTIVE_CONFIG_FILE))?;

        let final_path = final_assembly_path(&inputs.output_dir, &inputs.assembly);
        let set_name = final_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(run_id, "Preparing to run Nanopolish for {}", set_name);

        let install = NanopolishInstall::new(&inputs.nanopolish_dir);

        self.enter(state, dir, RunPhase::Planning)?;
        let regions = plan_ranges(&makerange_command(&settings.merge.python, &install, &inputs.assembly))?;
        info!(count = regions.len(), "planned regions");
        state.set_region_count(regions.len());

        let preparation = Preparation::new(
            &settings.tools,
            &install,
            dir,
            &inputs.assembly,
            &inputs.reads,
            &inputs.signal_dir,
            inputs.threads,
        );
        self.enter(state, dir, RunPhase::Aligning)?;
        preparation.align_reads()?;
        self.enter(state, dir, RunPhase::Indexing)?;
        preparation.index_alignment()?;
        preparation.index_reads()?;

        self.enter(state, dir, RunPhase::Submitting)?;
        let prefix = settings.job_prefix_for(run_id);
        state.set_job_prefix(prefix.clone());
        let scheduler = self.scheduler_for(dir)?;
        let consensus = ConsensusCommand::from_settings(
            install.executable(),
            inputs.reads.clone(),
            preparation.alignment().to_path_buf(),
            inputs.assembly.clone(),
            &settings.consensus,
        );
        let resources = ResourceSpec::from_settings(&settings.slurm);
        let ctx = SubmitContext {
            prefix: &prefix,
            consensus: &consensus,
            resources: &resources,
            workdir: dir,
        };
        let (_jobs, manifest) = submit_all(scheduler.as_ref(), &regions, &ctx)?;
        manifest.write_to_workspace(dir)?;

        self.enter(state, dir, RunPhase::Monitoring)?;
        let monitor = JobMonitor::new(
            prefix,
            MonitorConfig {
                poll_interval: settings.poll_interval(),
                max_wait: settings.max_wait(),
            },
        );
        let report = match self.sleep {
            Some(ref sleep) => monitor.wait_with(scheduler.as_ref(), |d| sleep(d))?,
            None => monitor.wait_until_done(scheduler.as_ref())?,
        };

        self.enter(state, dir, RunPhase::Filling)?;
        let fill = fill_incomplete(dir, &regions, settings.filler()?)?;
        state.set_incomplete_regions(fill.incomplete_ids());

        self.enter(state, dir, RunPhase::Merging)?;
        let discovered = discover_outputs(dir)?;
        let ordered = order_outputs(&regions, &discovered)?;
        let merger = Merger::new(settings.merge.mode, settings.merge.python.clone(), install.merge_script());
        merger.merge(&ordered, &final_path)?;

        Ok(RunOutcome {
            run_id: run_id.to_string(),
            final_assembly: final_path,
            region_count: regions.len(),
            incomplete_regions: fill.incomplete_ids(),
            monitor: report,
        })
    }
}
