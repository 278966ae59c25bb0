//! Nanopolish SLURM wrapper
//!
//! Polishes a draft assembly with Nanopolish by splitting it into regions,
//! running one consensus job per region on a SLURM cluster, and merging the
//! per-region results back into a single assembly in coordinate order.
//! Regions whose job produced nothing are masked with a filler symbol so the
//! merged assembly keeps every region.

pub mod config;
pub mod filler;
pub mod install;
pub mod job;
pub mod merge;
pub mod monitor;
pub mod pipeline;
pub mod planner;
pub mod prepare;
pub mod process;
pub mod scheduler;
pub mod state;
pub mod workspace;

pub use config::{EffectiveConfig, PolishSettings};
pub use pipeline::{Pipeline, PipelineError, RunInputs, RunOutcome};
pub use polish_region::Region;
pub use scheduler::{MockScheduler, Scheduler, SlurmScheduler};
pub use workspace::RunWorkspace;
