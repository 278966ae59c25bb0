//! Test fixtures for end-to-end runs
//!
//! A fixture is a scratch directory holding an input assembly and reads, a
//! fake Nanopolish install, fake `minimap2`/`samtools`, and a config file
//! pointing the pipeline at them. Helper scripts are run with `sh`, so the
//! configured interpreter is `sh` instead of `python`.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nanopolish_slurm::{EffectiveConfig, MockScheduler, Pipeline, RunInputs};
use tempfile::TempDir;

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Scratch layout for one or more runs
pub struct Fixture {
    pub root: TempDir,
    pub assembly: PathBuf,
    pub reads: PathBuf,
    pub signal_dir: PathBuf,
    pub output_dir: PathBuf,
    pub nanopolish_dir: PathBuf,
    pub config_path: PathBuf,
    bin_dir: PathBuf,
}

impl Fixture {
    pub fn new(ranges: &[&str]) -> Self {
        Self::with_assembly("asm.fasta", ranges)
    }

    pub fn with_assembly(name: &str, ranges: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        let input_dir = root.path().join("input");
        let signal_dir = root.path().join("fast5");
        let output_dir = root.path().join("out");
        let nanopolish_dir = root.path().join("nanopolish");
        let bin_dir = root.path().join("bin");
        for dir in [&input_dir, &signal_dir, &output_dir, &bin_dir, &nanopolish_dir.join("scripts")] {
            fs::create_dir_all(dir).unwrap();
        }

        let assembly = input_dir.join(name);
        fs::write(&assembly, ">c1\nACGTACGT\n").unwrap();
        let reads = input_dir.join("reads.fastq");
        fs::write(&reads, "@r1\nACGT\n+\n!!!!\n").unwrap();

        write_script(&bin_dir.join("minimap2"), "echo '@HD\tVN:1.6'\n");
        write_script(
            &bin_dir.join("samtools"),
            "case \"$1\" in\n  sort) cat > \"$3\" ;;\n  index) test -f \"$2\" ;;\nesac\n",
        );
        write_script(&nanopolish_dir.join("nanopolish"), "exit 0\n");
        fs::write(nanopolish_dir.join("scripts/nanopolish_merge.py"), "cat \"$@\"\n").unwrap();

        let fixture = Self {
            assembly,
            reads,
            signal_dir,
            output_dir,
            nanopolish_dir,
            config_path: root.path().join("config.toml"),
            bin_dir,
            root,
        };
        fixture.set_ranges(ranges);
        fixture.write_config("tool", "");
        fixture
    }

    /// Make the partitioner print `ranges`, one per line
    pub fn set_ranges(&self, ranges: &[&str]) {
        let quoted: Vec<String> = ranges.iter().map(|r| format!("'{}'", r)).collect();
        fs::write(
            self.nanopolish_dir.join("scripts/nanopolish_makerange.py"),
            format!("printf '%s\\n' {}\n", quoted.join(" ")),
        )
        .unwrap();
    }

    /// Make the partitioner exit non-zero
    pub fn fail_planner(&self) {
        fs::write(
            self.nanopolish_dir.join("scripts/nanopolish_makerange.py"),
            "echo 'cannot read assembly' >&2\nexit 3\n",
        )
        .unwrap();
    }

    /// Rewrite the config file; `extra` holds additional top-level keys
    pub fn write_config(&self, merge_mode: &str, extra: &str) {
        let config = format!(
            "poll_interval_seconds = 1\n{extra}\n\n[merge]\nmode = \"{mode}\"\npython = \"sh\"\n\n\
             [tools]\nminimap2 = \"{minimap2}\"\nsamtools = \"{samtools}\"\n",
            extra = extra,
            mode = merge_mode,
            minimap2 = self.bin_dir.join("minimap2").display(),
            samtools = self.bin_dir.join("samtools").display(),
        );
        fs::write(&self.config_path, config).unwrap();
    }

    pub fn config(&self) -> EffectiveConfig {
        EffectiveConfig::build(None, Some(&self.config_path)).unwrap()
    }

    /// A pipeline driving `scheduler` that never really sleeps
    pub fn pipeline(&self, scheduler: &MockScheduler) -> Pipeline {
        Pipeline::new(self.config())
            .unwrap()
            .with_scheduler(Arc::new(scheduler.clone()))
            .with_sleep(|_| {})
    }

    pub fn inputs(&self) -> RunInputs {
        RunInputs {
            assembly: self.assembly.clone(),
            reads: self.reads.clone(),
            signal_dir: self.signal_dir.clone(),
            output_dir: self.output_dir.clone(),
            nanopolish_dir: self.nanopolish_dir.clone(),
            threads: 4,
        }
    }

    /// Run workspaces left in the output directory
    pub fn workspaces(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.output_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_dir() && p.to_string_lossy().ends_with("_temp_dir"))
            .collect()
    }

    /// The only workspace left behind
    pub fn single_workspace(&self) -> PathBuf {
        let mut workspaces = self.workspaces();
        assert_eq!(workspaces.len(), 1, "expected one workspace: {:?}", workspaces);
        workspaces.remove(0)
    }
}

/// Parse a FASTA file into (header, sequence) pairs
pub fn records(path: &Path) -> Vec<(String, String)> {
    let text = fs::read_to_string(path).unwrap();
    let mut records = Vec::new();
    for line in text.lines() {
        if let Some(header) = line.strip_prefix('>') {
            records.push((header.to_string(), String::new()));
        } else if let Some(last) = records.last_mut() {
            last.1.push_str(line);
        }
    }
    records
}
