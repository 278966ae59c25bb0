//! Placeholder output for regions whose job produced nothing
//!
//! Runs after the monitor reaches DONE. Any region without its expected
//! output file gets a placeholder record of the right length, so the merge
//! always has one well-formed input per region and the gap stays visible in
//! the final assembly instead of being dropped.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use polish_region::{write_placeholder, Region};
use tracing::warn;

/// Filling errors
#[derive(Debug, thiserror::Error)]
pub enum FillError {
    #[error("failed to write placeholder {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Regions that had to be masked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub incomplete: Vec<Region>,
}

impl FillReport {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    pub fn incomplete_ids(&self) -> Vec<String> {
        self.incomplete.iter().map(|r| r.id().to_string()).collect()
    }
}

/// Regions whose output file is missing, in planner order
pub fn find_incomplete<'a>(workspace: &Path, regions: &'a [Region]) -> Vec<&'a Region> {
    regions
        .iter()
        .filter(|region| !workspace.join(region.output_file_name()).is_file())
        .collect()
}

/// Write placeholders for every region lacking output
pub fn fill_incomplete(workspace: &Path, regions: &[Region], symbol: char) -> Result<FillReport, FillError> {
    let incomplete = find_incomplete(workspace, regions);

    if !incomplete.is_empty() {
        let ids: Vec<&str> = incomplete.iter().map(|r| r.id()).collect();
        warn!(
            count = incomplete.len(),
            "some ranges did not complete: {}",
            ids.join(", ")
        );
    }

    for region in &incomplete {
        let path = workspace.join(region.output_file_name());
        write_placeholder_file(&path, region, symbol).map_err(|source| FillError::Write { path, source })?;
    }

    Ok(FillReport {
        incomplete: incomplete.into_iter().cloned().collect(),
    })
}

/// Stream the placeholder to disk; spans are never held in memory whole.
fn write_placeholder_file(path: &Path, region: &Region, symbol: char) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_placeholder(&mut out, region, symbol)?;
    out.flush()
}
