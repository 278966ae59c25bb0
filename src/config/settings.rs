//! Typed view of the merged configuration.

use std::time::Duration;

use polish_region::validate_filler_symbol;
use serde::{Deserialize, Serialize};

use super::effective::ConfigError;

/// Placeholder substituted with the run identifier in `job_prefix`.
pub const RUN_ID_PLACEHOLDER: &str = "{run_id}";

/// All knobs that shape one polishing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolishSettings {
    pub poll_interval_seconds: u64,

    /// No timeout when unset.
    #[serde(default)]
    pub max_wait_seconds: Option<u64>,

    pub filler_symbol: String,

    pub job_prefix: String,

    pub slurm: SlurmSettings,

    pub consensus: ConsensusSettings,

    pub merge: MergeSettings,

    pub tools: ToolSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlurmSettings {
    pub partition: String,
    pub cpus_per_task: u32,
    pub mem_mb: u64,
    pub time: String,

    /// Restrict queue queries to this user
    #[serde(default)]
    pub user: Option<String>,

    pub sbatch: String,
    pub squeue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSettings {
    pub threads: u32,
    pub min_candidate_frequency: f64,
}

/// How per-region outputs are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Run `nanopolish_merge.py` over the ordered files
    Tool,
    /// Concatenate the ordered files directly
    Concat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    pub mode: MergeMode,
    /// Interpreter for the install's helper scripts (range planning and merge)
    pub python: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    pub minimap2: String,
    pub samtools: String,
}

impl PolishSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_seconds.map(Duration::from_secs)
    }

    /// The validated filler character.
    pub fn filler(&self) -> Result<char, ConfigError> {
        validate_filler_symbol(&self.filler_symbol)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Expand the job prefix template for a run.
    pub fn job_prefix_for(&self, run_id: &str) -> String {
        self.job_prefix.replace(RUN_ID_PLACEHOLDER, run_id)
    }

    /// Check value bounds that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_seconds == 0 || self.poll_interval_seconds > 86400 {
            return Err(ConfigError::ValidationError(
                "poll_interval_seconds must be in (0, 86400]".to_string(),
            ));
        }

        if let Some(max_wait) = self.max_wait_seconds {
            if max_wait < self.poll_interval_seconds {
                return Err(ConfigError::ValidationError(format!(
                    "max_wait_seconds must be at least poll_interval_seconds ({})",
                    self.poll_interval_seconds
                )));
            }
        }

        self.filler()?;

        if !self.job_prefix.contains(RUN_ID_PLACEHOLDER) {
            return Err(ConfigError::ValidationError(format!(
                "job_prefix must contain {} so concurrent runs stay apart",
                RUN_ID_PLACEHOLDER
            )));
        }

        if self.slurm.cpus_per_task == 0 {
            return Err(ConfigError::ValidationError(
                "slurm.cpus_per_task must be greater than 0".to_string(),
            ));
        }
        if self.slurm.mem_mb == 0 {
            return Err(ConfigError::ValidationError(
                "slurm.mem_mb must be greater than 0".to_string(),
            ));
        }
        if self.consensus.threads == 0 {
            return Err(ConfigError::ValidationError(
                "consensus.threads must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.consensus.min_candidate_frequency) {
            return Err(ConfigError::ValidationError(
                "consensus.min_candidate_frequency must be in [0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PolishSettings {
    fn default() -> Self {
        let value = super::BuiltinDefaults::default().to_value();
        // Builtin defaults always deserialize.
        serde_json::from_value(value).expect("builtin defaults match PolishSettings")
    }
}
