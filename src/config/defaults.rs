//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Seconds between scheduler queue checks (default: 60)
    pub poll_interval_seconds: u64,

    /// Placeholder sequence symbol (default: "N")
    pub filler_symbol: String,

    /// Job-name prefix template, `{run_id}` is substituted
    pub job_prefix: String,

    /// SLURM partition (default: "sysgen")
    pub slurm_partition: String,

    /// CPUs per consensus job (default: 2)
    pub slurm_cpus_per_task: u32,

    /// Memory per consensus job in MB (default: 4096)
    pub slurm_mem_mb: u64,

    /// Wall-clock limit per consensus job (default: "0-4:0:00")
    pub slurm_time: String,

    /// Threads passed to the consensus tool (default: 2)
    pub consensus_threads: u32,

    /// Minimum candidate frequency passed to the consensus tool (default: 0.1)
    pub consensus_min_candidate_frequency: f64,

    /// Merge strategy (default: "tool")
    pub merge_mode: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 60,
            filler_symbol: "N".to_string(),
            job_prefix: "Nanopolish_{run_id}_".to_string(),
            slurm_partition: "sysgen".to_string(),
            slurm_cpus_per_task: 2,
            slurm_mem_mb: 4096,
            slurm_time: "0-4:0:00".to_string(),
            consensus_threads: 2,
            consensus_min_candidate_frequency: 0.1,
            merge_mode: "tool".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "poll_interval_seconds": self.poll_interval_seconds,
            "filler_symbol": self.filler_symbol,
            "job_prefix": self.job_prefix,
            "slurm": {
                "partition": self.slurm_partition,
                "cpus_per_task": self.slurm_cpus_per_task,
                "mem_mb": self.slurm_mem_mb,
                "time": self.slurm_time,
                "sbatch": "sbatch",
                "squeue": "squeue"
            },
            "consensus": {
                "threads": self.consensus_threads,
                "min_candidate_frequency": self.consensus_min_candidate_frequency
            },
            "merge": {
                "mode": self.merge_mode,
                "python": "python"
            },
            "tools": {
                "minimap2": "minimap2",
                "samtools": "samtools"
            }
        })
    }
}
