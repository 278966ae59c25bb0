//! Alignment and index preparation
//!
//! Produces the inputs every consensus job reads: a sorted, indexed
//! read-to-assembly alignment in the workspace and the nanopolish read
//! index beside the reads file.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::ToolSettings;
use crate::install::NanopolishInstall;
use crate::process::{ProcessError, ToolCommand};

/// Sorted alignment file name inside the workspace
pub const ALIGNMENT_FILE: &str = "reads.sorted.bam";

/// Temp prefix handed to `samtools sort`
pub const SORT_TEMP_PREFIX: &str = "reads.tmp";

/// Preparation errors (all fatal)
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("read alignment failed: {0}")]
    Align(#[source] ProcessError),

    #[error("alignment indexing failed: {0}")]
    IndexAlignment(#[source] ProcessError),

    #[error("nanopolish index failed: {0}")]
    IndexReads(#[source] ProcessError),

    #[error("expected {0} after alignment, but it is missing")]
    MissingAlignment(PathBuf),
}

/// Commands that prepare alignment and indexes for one run
#[derive(Debug, Clone)]
pub struct Preparation {
    pub align: ToolCommand,
    pub sort: ToolCommand,
    pub index_alignment: ToolCommand,
    pub index_reads: ToolCommand,
    alignment: PathBuf,
}

impl Preparation {
    pub fn new(
        tools: &ToolSettings,
        install: &NanopolishInstall,
        workspace: &Path,
        assembly: &Path,
        reads: &Path,
        signal_dir: &Path,
        threads: u32,
    ) -> Self {
        let align = ToolCommand::new(&tools.minimap2)
            .args(["-x", "map10k", "-a", "-t"])
            .arg(threads.to_string())
            .arg(assembly)
            .arg(reads)
            .current_dir(workspace);

        let sort = ToolCommand::new(&tools.samtools)
            .args(["sort", "-o", ALIGNMENT_FILE, "-T", SORT_TEMP_PREFIX, "-"])
            .current_dir(workspace);

        let index_alignment = ToolCommand::new(&tools.samtools)
            .args(["index", ALIGNMENT_FILE])
            .current_dir(workspace);

        let index_reads = ToolCommand::new(install.executable())
            .args(["index", "-d"])
            .arg(signal_dir)
            .arg(reads)
            .current_dir(workspace);

        Self {
            align,
            sort,
            index_alignment,
            index_reads,
            alignment: workspace.join(ALIGNMENT_FILE),
        }
    }

    /// Path of the sorted alignment
    pub fn alignment(&self) -> &Path {
        &self.alignment
    }

    /// Align reads and sort the alignment
    pub fn align_reads(&self) -> Result<(), PrepareError> {
        info!("Aligning reads");
        self.align.pipe_into(&self.sort).map_err(PrepareError::Align)?;
        if !self.alignment.is_file() {
            return Err(PrepareError::MissingAlignment(self.alignment.clone()));
        }
        Ok(())
    }

    /// Index the sorted alignment
    pub fn index_alignment(&self) -> Result<(), PrepareError> {
        self.index_alignment
            .output()
            .map(|_| ())
            .map_err(PrepareError::IndexAlignment)
    }

    /// Build the nanopolish read index
    pub fn index_reads(&self) -> Result<(), PrepareError> {
        info!("Running nanopolish index");
        self.index_reads
            .output()
            .map(|_| ())
            .map_err(PrepareError::IndexReads)
    }
}
