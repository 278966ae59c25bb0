//! Configuration merge system
//!
//! Implements the 3-layer configuration merge:
//! 1. Built-in defaults
//! 2. Host/user config (~/.config/nanopolish-slurm/config.toml)
//! 3. File named by `NANOPOLISH_SLURM_CONFIG`
//!
//! Positional arguments never pass through here; they are run inputs,
//! not settings.

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{
    ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, CONFIG_ENV_VAR,
    EFFECTIVE_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    ConsensusSettings, MergeMode, MergeSettings, PolishSettings, SlurmSettings, ToolSettings,
};
