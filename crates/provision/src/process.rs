//! Subprocess execution.
//!
//! Every external tool (the compose CLI, composer, npm) is invoked through a
//! [`CommandRunner`] so provisioners can be driven against a fake in tests.

use std::{fmt, future::Future, path::PathBuf, process::Stdio};

use anyhow::{Context, Result};

/// A command to run: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    /// Create a new command spec running `program` in `cwd`.
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    /// Append arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The full command line, space separated.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a nonzero exit into an error carrying the captured output.
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }

        let status = self
            .code
            .map(|code| format!("exit code {}", code))
            .unwrap_or_else(|| "terminated by signal".to_string());

        anyhow::bail!(
            "`{}` failed with {}\nstdout: {}\nstderr: {}",
            spec,
            status,
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }
}

/// Runs external commands to completion.
pub trait CommandRunner: Send + Sync {
    /// Run the command and capture its output.
    ///
    /// Only failing to spawn is an error; a nonzero exit is reported through
    /// [`CommandOutput::code`].
    fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec, cwd = %spec.cwd.display(), "Running command");

        let output = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to spawn `{}`", spec))?;

        let output = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::trace!(command = %spec, code = ?output.code, "Command finished");

        Ok(output)
    }
}
