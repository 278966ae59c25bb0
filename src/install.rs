//! Layout of a nanopolish installation directory.

use std::path::PathBuf;

/// Paths to the nanopolish binary and helper scripts under one install root.
#[derive(Debug, Clone)]
pub struct NanopolishInstall {
    root: PathBuf,
}

impl NanopolishInstall {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The `nanopolish` executable
    pub fn executable(&self) -> PathBuf {
        self.root.join("nanopolish")
    }

    /// Region partitioner script
    pub fn makerange_script(&self) -> PathBuf {
        self.root.join("scripts").join("nanopolish_makerange.py")
    }

    /// Per-region FASTA merge script
    pub fn merge_script(&self) -> PathBuf {
        self.root.join("scripts").join("nanopolish_merge.py")
    }
}
