//! External process execution with a hard timeout.
//!
//! Every converter in the pipeline is, ultimately, a child process. The
//! [`ProcessRunner`] trait is the single seam through which they run, so
//! platform-specific candidates stay plain data ([`CommandSpec`]) and tests can
//! substitute a scripted runner.
//!
//! Three outcomes are distinguished:
//!
//! * the executable is absent → [`ProcessError::NotFound`] (callers move on
//!   silently),
//! * it ran past its budget → [`ProcessError::TimedOut`] (the child is killed),
//! * it ran to completion → [`ProcessOutput`], whatever its exit status.

use crate::error::AttemptError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Bare program name (looked up on `PATH`) or absolute path.
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Short, log-friendly rendering of the command line.
    pub fn display(&self) -> String {
        let line = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        AttemptError::truncate(&line, 120)
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a process did not run to completion.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable does not exist (not on `PATH`, or absolute path missing).
    #[error("executable '{program}' not found")]
    NotFound { program: String },

    /// The process exceeded its time budget and was killed.
    #[error("'{program}' timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    /// Spawning or waiting failed for another reason.
    #[error("failed to run '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<ProcessError> for AttemptError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound { program } => AttemptError::ToolNotFound { program },
            ProcessError::TimedOut { program, secs } => AttemptError::Timeout { program, secs },
            ProcessError::Io { source, .. } => AttemptError::Io(source),
        }
    }
}

/// Runs external commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` to completion or until `timeout` elapses.
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// The child is spawned with `kill_on_drop`, so when the timeout future wins
/// the race the process is killed rather than left running.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
        let start = Instant::now();
        debug!("Running: {}", spec.display());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(ProcessError::NotFound {
                program: spec.program.clone(),
            }),
            Ok(Err(e)) => Err(ProcessError::Io {
                program: spec.program.clone(),
                source: e,
            }),
            Err(_) => Err(ProcessError::TimedOut {
                program: spec.program.clone(),
                secs: timeout.as_secs(),
            }),
        }
    }
}

/// Run `spec` and treat a non-zero exit status as a failed attempt.
pub(crate) async fn run_tool(
    runner: &dyn ProcessRunner,
    spec: &CommandSpec,
    timeout: Duration,
) -> Result<ProcessOutput, AttemptError> {
    let output = runner.run(spec, timeout).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(AttemptError::ToolFailed {
            program: spec.program.clone(),
            code: output.exit_code,
            stderr: AttemptError::truncate(&output.stderr, 500),
        })
    }
}

/// `true` if `path` names an existing file. Used for absolute-path candidates.
pub(crate) fn exists(path: &str) -> bool {
    PathBuf::from(path).is_file()
}
