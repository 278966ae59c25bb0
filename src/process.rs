//! Structured external commands
//!
//! Every collaborator (partitioner, aligner, indexer, scheduler, merger) is
//! invoked through a [`ToolCommand`]: a program plus an argument vector.
//! Nothing is ever passed through a shell, so paths and region names with
//! spaces or metacharacters reach the tool unchanged.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use tracing::debug;

/// Errors from running an external tool
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error around `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A program invocation with explicit arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Spawn {
            command: self.to_string(),
            source,
        }
    }

    fn check(&self, output: Output) -> Result<Output, ProcessError> {
        if output.status.success() {
            Ok(output)
        } else {
            Err(ProcessError::Failed {
                command: self.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run to completion capturing stdout and stderr; non-zero exit is an error.
    pub fn output(&self) -> Result<Output, ProcessError> {
        debug!(command = %self, "running");
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;
        self.check(output)
    }

    /// Run with stdout captured as UTF-8 text.
    pub fn output_text(&self) -> Result<String, ProcessError> {
        let output = self.output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run with stdout written to `path` (truncating it).
    pub fn output_to_file(&self, path: &Path) -> Result<(), ProcessError> {
        debug!(command = %self, output = %path.display(), "running");
        let file = File::create(path).map_err(|e| ProcessError::Io {
            command: self.to_string(),
            source: e,
        })?;
        let output = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.spawn_error(e))?;
        self.check(output).map(|_| ())
    }

    /// Run `self | next`, both checked; returns once both have exited.
    pub fn pipe_into(&self, next: &ToolCommand) -> Result<(), ProcessError> {
        debug!(producer = %self, consumer = %next, "running pipeline");
        let mut producer = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            // Inherited: aligners log heavily and nobody drains a piped stderr here.
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = producer.stdout.take().ok_or_else(|| ProcessError::Io {
            command: self.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout not captured"),
        })?;

        let consumer = next
            .command()
            .stdin(Stdio::from(stdout))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let consumer = match consumer {
            Ok(child) => child,
            Err(e) => {
                let _ = producer.kill();
                let _ = producer.wait();
                return Err(next.spawn_error(e));
            }
        };

        // Wait on the consumer first so the producer never blocks on a full pipe.
        let consumer_output = consumer.wait_with_output().map_err(|e| ProcessError::Io {
            command: next.to_string(),
            source: e,
        })?;
        let producer_output = producer.wait_with_output().map_err(|e| ProcessError::Io {
            command: self.to_string(),
            source: e,
        })?;

        self.check(producer_output)?;
        next.check(consumer_output)?;
        Ok(())
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
