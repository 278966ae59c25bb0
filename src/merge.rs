//! Result merging
//!
//! Joins every per-region output into the final assembly in coordinate
//! order. Order comes from the parsed region coordinates, never from
//! directory listing order: lexically `c1:100-200` sorts before `c1:90-100`.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use polish_region::{contig_ranks, sort_by_coordinate, Region};
use tracing::{info, warn};

use crate::config::MergeMode;
use crate::process::{ProcessError, ToolCommand};

/// Glob matching per-region output file names
pub const OUTPUT_GLOB: &str = "polished.*.fa";

/// Merge errors (all fatal)
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("output for region {0} is missing at merge time")]
    MissingOutput(String),

    #[error("cannot list workspace {path}: {source}")]
    Discover {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid output glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("merge tool failed: {0}")]
    Tool(#[from] ProcessError),

    #[error("failed writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn output_matcher() -> Result<GlobMatcher, MergeError> {
    Ok(Glob::new(OUTPUT_GLOB)?.compile_matcher())
}

/// Per-region output files present in the workspace, in no particular order
pub fn discover_outputs(workspace: &Path) -> Result<Vec<PathBuf>, MergeError> {
    let matcher = output_matcher()?;
    let discover_err = |source| MergeError::Discover {
        path: workspace.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in fs::read_dir(workspace).map_err(discover_err)? {
        let entry = entry.map_err(discover_err)?;
        let path = entry.path();
        if path.is_file() && matcher.is_match(entry.file_name()) {
            found.push(path);
        }
    }
    Ok(found)
}

/// Select the file of every planned region from `discovered` and order them
/// by coordinate.
///
/// A planned region without a discovered file is an error. Discovered files
/// that match no planned region are left out.
pub fn order_outputs(regions: &[Region], discovered: &[PathBuf]) -> Result<Vec<PathBuf>, MergeError> {
    let by_id: HashMap<&str, &PathBuf> = discovered
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            Region::id_from_output_file_name(name).map(|id| (id, path))
        })
        .collect();

    let mut planned: Vec<(&Region, PathBuf)> = Vec::with_capacity(regions.len());
    for region in regions {
        let path = by_id
            .get(region.id())
            .ok_or_else(|| MergeError::MissingOutput(region.id().to_string()))?;
        planned.push((region, (*path).clone()));
    }

    let expected: HashSet<&str> = regions.iter().map(|r| r.id()).collect();
    for path in discovered {
        let known = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(Region::id_from_output_file_name)
            .map_or(false, |id| expected.contains(id));
        if !known {
            warn!(file = %path.display(), "ignoring output that belongs to no planned region");
        }
    }

    let ranks = contig_ranks(regions);
    sort_by_coordinate(&mut planned, &ranks, |(region, _)| *region);
    Ok(planned.into_iter().map(|(_, path)| path).collect())
}

/// Final assembly path: `<output_dir>/<set_name>.fasta`, where `set_name` is
/// the assembly file name up to its first `.fasta`.
pub fn final_assembly_path(output_dir: &Path, assembly: &Path) -> PathBuf {
    let file_name = assembly
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let set_name = file_name.split(".fasta").next().unwrap_or_default();
    output_dir.join(format!("{}.fasta", set_name))
}

/// Joins ordered per-region outputs into one file
#[derive(Debug, Clone)]
pub struct Merger {
    mode: MergeMode,
    python: String,
    merge_script: PathBuf,
}

impl Merger {
    pub fn new(mode: MergeMode, python: impl Into<String>, merge_script: PathBuf) -> Self {
        Self {
            mode,
            python: python.into(),
            merge_script,
        }
    }

    /// Command the tool strategy runs
    pub fn tool_command(&self, files: &[PathBuf]) -> ToolCommand {
        ToolCommand::new(&self.python).arg(&self.merge_script).args(files)
    }

    /// Write the merged assembly to `destination`.
    ///
    /// The result is staged beside the destination and renamed into place,
    /// so a failed merge never leaves a truncated assembly behind.
    pub fn merge(&self, files: &[PathBuf], destination: &Path) -> Result<(), MergeError> {
        info!(files = files.len(), destination = %destination.display(), mode = ?self.mode, "merging");

        let staging = staging_path(destination);
        let result = match self.mode {
            MergeMode::Tool => self
                .tool_command(files)
                .output_to_file(&staging)
                .map_err(MergeError::from),
            MergeMode::Concat => concatenate(files, &staging),
        };

        if let Err(e) = result {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        fs::rename(&staging, destination).map_err(|source| MergeError::Write {
            path: destination.to_path_buf(),
            source,
        })
    }
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

/// Concatenate `files` into `destination`, ending each file on a newline
fn concatenate(files: &[PathBuf], destination: &Path) -> Result<(), MergeError> {
    let write_err = |source| MergeError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let out = File::create(destination).map_err(write_err)?;
    let mut out = BufWriter::new(out);

    for path in files {
        let mut contents = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut contents))
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => MergeError::MissingOutput(path.display().to_string()),
                _ => MergeError::Write {
                    path: path.clone(),
                    source,
                },
            })?;

        out.write_all(&contents).map_err(write_err)?;
        if !contents.is_empty() && !contents.ends_with(b"\n") {
            out.write_all(b"\n").map_err(write_err)?;
        }
    }

    out.flush().map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn regions(ids: &[&str]) -> Vec<Region> {
        ids.iter().map(|id| Region::parse(id).unwrap()).collect()
    }

    fn write_outputs(dir: &Path, ids: &[&str]) -> Vec<PathBuf> {
        ids.iter()
            .map(|id| {
                let path = dir.join(format!("polished.{}.fa", id));
                fs::write(&path, format!(">{}\nACGT\n", id)).unwrap();
                path
            })
            .collect()
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_discover_matches_only_outputs() {
        let dir = TempDir::new().unwrap();
        write_outputs(dir.path(), &["c1:0-100", "c1:100-200"]);
        fs::write(dir.path().join("reads.sorted.bam"), b"").unwrap();
        fs::write(dir.path().join("run_state.json"), b"{}").unwrap();

        let mut found = names(&discover_outputs(dir.path()).unwrap());
        found.sort();
        assert_eq!(found, vec!["polished.c1:0-100.fa", "polished.c1:100-200.fa"]);
    }

    #[test]
    fn test_order_by_coordinate_not_listing() {
        let dir = TempDir::new().unwrap();
        let planned = regions(&["c1:0-100", "c1:100-200", "c1:900-1000"]);
        let discovered = write_outputs(dir.path(), &["c1:900-1000", "c1:0-100", "c1:100-200"]);

        let ordered = order_outputs(&planned, &discovered).unwrap();
        assert_eq!(
            names(&ordered),
            vec!["polished.c1:0-100.fa", "polished.c1:100-200.fa", "polished.c1:900-1000.fa"]
        );
    }

    #[test]
    fn test_order_diverges_from_lexical() {
        let dir = TempDir::new().unwrap();
        let planned = regions(&["c:0-90", "c:90-100", "c:100-1000"]);
        let mut discovered = write_outputs(dir.path(), &["c:100-1000", "c:0-90", "c:90-100"]);
        discovered.sort();

        let ordered = order_outputs(&planned, &discovered).unwrap();
        assert_eq!(
            names(&ordered),
            vec!["polished.c:0-90.fa", "polished.c:90-100.fa", "polished.c:100-1000.fa"]
        );
    }

    #[test]
    fn test_missing_output_is_fatal() {
        let dir = TempDir::new().unwrap();
        let planned = regions(&["c:0-10", "c:10-20"]);
        let discovered = write_outputs(dir.path(), &["c:0-10"]);

        let err = order_outputs(&planned, &discovered).unwrap_err();
        assert!(matches!(err, MergeError::MissingOutput(id) if id == "c:10-20"));
    }

    #[test]
    fn test_stray_output_ignored() {
        let dir = TempDir::new().unwrap();
        let planned = regions(&["c:0-10"]);
        let discovered = write_outputs(dir.path(), &["c:0-10", "old:0-5"]);

        let ordered = order_outputs(&planned, &discovered).unwrap();
        assert_eq!(names(&ordered), vec!["polished.c:0-10.fa"]);
    }

    #[test]
    fn test_final_assembly_path() {
        assert_eq!(
            final_assembly_path(Path::new("/out"), Path::new("/data/sample_01.fasta")),
            Path::new("/out/sample_01.fasta")
        );
        assert_eq!(
            final_assembly_path(Path::new("/out"), Path::new("/data/sample.fasta.gz")),
            Path::new("/out/sample.fasta")
        );
        assert_eq!(
            final_assembly_path(Path::new("/out"), Path::new("/data/sample.fa")),
            Path::new("/out/sample.fa.fasta")
        );
    }

    #[test]
    fn test_concat_merge() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("polished.c:0-4.fa");
        let b = dir.path().join("polished.c:4-8.fa");
        fs::write(&a, ">c:0-4\nACGT").unwrap();
        fs::write(&b, ">c:4-8\nNNNN\n").unwrap();

        let destination = dir.path().join("final.fasta");
        let merger = Merger::new(MergeMode::Concat, "python", PathBuf::from("merge.py"));
        merger.merge(&[a, b], &destination).unwrap();

        assert_eq!(
            fs::read_to_string(&destination).unwrap(),
            ">c:0-4\nACGT\n>c:4-8\nNNNN\n"
        );
        assert!(!dir.path().join("final.fasta.partial").exists());
    }

    #[test]
    fn test_concat_missing_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("final.fasta");
        let merger = Merger::new(MergeMode::Concat, "python", PathBuf::from("merge.py"));

        let err = merger
            .merge(&[dir.path().join("polished.c:0-4.fa")], &destination)
            .unwrap_err();
        assert!(matches!(err, MergeError::MissingOutput(_)));
        assert!(!destination.exists());
        assert!(!dir.path().join("final.fasta.partial").exists());
    }

    #[test]
    fn test_tool_command() {
        let merger = Merger::new(
            MergeMode::Tool,
            "python",
            PathBuf::from("/opt/np/scripts/nanopolish_merge.py"),
        );
        let files = vec![PathBuf::from("polished.c:0-4.fa"), PathBuf::from("polished.c:4-8.fa")];
        assert_eq!(
            merger.tool_command(&files).to_string(),
            "python /opt/np/scripts/nanopolish_merge.py polished.c:0-4.fa polished.c:4-8.fa"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_merge_writes_stdout() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("polished.c:0-4.fa");
        fs::write(&a, ">c:0-4\nACGT\n").unwrap();

        // `sh cat-script file...` stands in for `python nanopolish_merge.py file...`
        let script = dir.path().join("merge.sh");
        fs::write(&script, "cat \"$@\"\n").unwrap();

        let destination = dir.path().join("final.fasta");
        let merger = Merger::new(MergeMode::Tool, "sh", script);
        merger.merge(&[a], &destination).unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), ">c:0-4\nACGT\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_failure_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("merge.sh");
        fs::write(&script, "echo partial; exit 1\n").unwrap();

        let destination = dir.path().join("final.fasta");
        let merger = Merger::new(MergeMode::Tool, "sh", script);
        assert!(matches!(merger.merge(&[], &destination), Err(MergeError::Tool(_))));
        assert!(!destination.exists());
    }
}
