//! One named unit of provisioning work: an optional guard plus the actions
//! that establish the state the guard checks for.

use crate::error::{ProvisionError, Result};
use crate::fetch;
use crate::guard::Guard;
use crate::io;
use crate::runner::{CmdSpec, CommandRunner, ExecResult};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Action {
    /// Run an external command; non-zero exit aborts the step unless the
    /// spec tolerates failure.
    Run(CmdSpec),
    WriteFile {
        path: PathBuf,
        contents: String,
        mode: Option<u32>,
    },
    /// Run a command and write its stdout to a file (`foo > path`).
    CaptureToFile { spec: CmdSpec, path: PathBuf },
    EnsureLine { path: PathBuf, line: String },
    ReplaceOnce {
        path: PathBuf,
        from: String,
        to: String,
    },
    CommentLines { path: PathBuf, needle: String },
    Download {
        url: String,
        path: PathBuf,
        mode: Option<u32>,
    },
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub guard: Option<Guard>,
    pub actions: Vec<Action>,
}

impl Step {
    pub fn new(name: impl Into<String>, guard: Option<Guard>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            guard,
            actions,
        }
    }

    /// Run all actions in order, aborting on the first failure. The guard
    /// has already been evaluated by the pipeline at this point; actions are
    /// fully resolved against the host at pipeline-definition time.
    pub(crate) fn execute(&self, runner: &dyn CommandRunner) -> Result<()> {
        for action in &self.actions {
            self.apply(action, runner)?;
        }
        Ok(())
    }

    fn apply(&self, action: &Action, runner: &dyn CommandRunner) -> Result<()> {
        match action {
            Action::Run(spec) => {
                let result = runner.run(spec)?;
                self.check(spec, &result)
            }
            Action::WriteFile {
                path,
                contents,
                mode,
            } => {
                io::atomic_write(path, contents.as_bytes())?;
                if let Some(mode) = mode {
                    io::set_mode(path, *mode)?;
                }
                Ok(())
            }
            Action::CaptureToFile { spec, path } => {
                let result = runner.run(spec)?;
                self.check(spec, &result)?;
                io::atomic_write(path, result.stdout.as_bytes())
            }
            Action::EnsureLine { path, line } => {
                io::ensure_line(path, line)?;
                Ok(())
            }
            Action::ReplaceOnce { path, from, to } => {
                io::replace_once(path, from, to)?;
                Ok(())
            }
            Action::CommentLines { path, needle } => {
                io::comment_lines_containing(path, needle)?;
                Ok(())
            }
            Action::Download { url, path, mode } => fetch::download(url, path, *mode),
        }
    }

    fn check(&self, spec: &CmdSpec, result: &ExecResult) -> Result<()> {
        if result.success() {
            return Ok(());
        }
        if spec.allow_failure {
            tracing::debug!(
                "tolerated exit {} from `{spec}` in step '{}'",
                result.exit_code,
                self.name
            );
            return Ok(());
        }
        Err(ProvisionError::StepFailed {
            step: self.name.clone(),
            code: result.exit_code,
            stderr: stderr_tail(result),
        })
    }
}

/// The last few stderr lines; enough to see why a tool bailed without
/// replaying its whole transcript in the error message.
fn stderr_tail(result: &ExecResult) -> String {
    let source = if result.stderr.trim().is_empty() {
        &result.stdout
    } else {
        &result.stderr
    };
    let lines: Vec<&str> = source.trim_end().lines().collect();
    let tail_start = lines.len().saturating_sub(5);
    lines[tail_start..].join("\n")
}
