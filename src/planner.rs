//! Region planning
//!
//! Captures the partitioner's output as the ordered list of regions to
//! polish. Coverage and ordering are the partitioner's guarantee; this
//! module only refuses output it cannot use.

use std::collections::HashSet;
use std::path::Path;

use polish_region::{Region, RegionError};
use tracing::info;

use crate::install::NanopolishInstall;
use crate::process::{ProcessError, ToolCommand};

/// Planner errors. All of them are fatal: nothing is polished.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("region partitioner failed: {0}")]
    ToolFailed(#[from] ProcessError),

    #[error("region partitioner produced no regions")]
    Empty,

    #[error("line {line} of partitioner output is not a region: {source}")]
    InvalidRegion {
        line: usize,
        #[source]
        source: RegionError,
    },

    #[error("region {0} listed more than once")]
    Duplicate(String),
}

/// Command that lists the regions of `assembly`
pub fn makerange_command(python: &str, install: &NanopolishInstall, assembly: &Path) -> ToolCommand {
    ToolCommand::new(python)
        .arg(install.makerange_script())
        .arg(assembly)
}

/// Parse partitioner output, one region per line, order preserved.
///
/// Only line terminators are stripped; any other whitespace makes the line
/// an invalid region.
pub fn parse_ranges(output: &str) -> Result<Vec<Region>, PlannerError> {
    let mut seen = HashSet::new();
    let mut regions = Vec::new();

    for (index, line) in output.lines().enumerate() {
        let region = Region::parse(line).map_err(|source| PlannerError::InvalidRegion {
            line: index + 1,
            source,
        })?;
        if !seen.insert(region.id().to_string()) {
            return Err(PlannerError::Duplicate(region.id().to_string()));
        }
        regions.push(region);
    }

    if regions.is_empty() {
        return Err(PlannerError::Empty);
    }
    Ok(regions)
}

/// Run the partitioner and return its regions
pub fn plan_ranges(command: &ToolCommand) -> Result<Vec<Region>, PlannerError> {
    info!("Getting ranges");
    let output = command.output_text()?;
    let regions = parse_ranges(&output)?;

    let listing: Vec<&str> = regions.iter().map(|r| r.id()).collect();
    info!(count = regions.len(), "ranges: {}", listing.join(", "));
    Ok(regions)
}
