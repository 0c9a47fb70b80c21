//! External command invocation.
//!
//! Every mutation of the host goes through a [`CommandRunner`], so tests can
//! substitute a scripted fake instead of touching a real machine. The runner
//! itself never decides whether a non-zero exit is fatal; that policy lives
//! with the step that issued the command.

use std::fmt;
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::error::{ProvisionError, Result};

// ---------------------------------------------------------------------------
// CmdSpec
// ---------------------------------------------------------------------------

/// One external command, fully described before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Run via `sudo -u <user> -H` instead of as the current (root) user.
    pub run_as: Option<String>,
    /// Tolerate a non-zero exit (e.g. removing an already-absent taint).
    pub allow_failure: bool,
}

impl CmdSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            run_as: None,
            allow_failure: false,
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn as_user(mut self, user: &str) -> Self {
        self.run_as = Some(user.to_string());
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }
}

impl fmt::Display for CmdSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.run_as {
            write!(f, "sudo -u {user} -H ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ExecResult
// ---------------------------------------------------------------------------

/// Captured outcome of one command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A successful result with the given stdout. Used by fakes and tests.
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Capability seam over process execution.
///
/// `run` returns `Err` only when the command could not be executed at all
/// (spawn failure). A command that ran and exited non-zero is a normal
/// `Ok(ExecResult)`; callers inspect `exit_code`.
pub trait CommandRunner {
    fn run(&self, spec: &CmdSpec) -> Result<ExecResult>;
}

/// The real runner: spawns processes on the host, captures output.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CmdSpec) -> Result<ExecResult> {
        let mut cmd = match &spec.run_as {
            Some(user) => {
                let mut c = Command::new("sudo");
                c.args(["-u", user, "-H"]);
                c.arg(&spec.program);
                c.args(&spec.args);
                c
            }
            None => {
                let mut c = Command::new(&spec.program);
                c.args(&spec.args);
                c
            }
        };
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("running: {spec}");
        let start = Instant::now();
        let output = cmd.output().map_err(|source| ProvisionError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let duration_ms = start.elapsed().as_millis() as u64;

        // Exit-by-signal has no code; -1 keeps it distinguishable from success.
        let exit_code = output.status.code().unwrap_or(-1);
        let result = ExecResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
        };
        tracing::debug!("exit {} after {}ms: {spec}", result.exit_code, duration_ms);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_sudo_wrapper() {
        let spec = CmdSpec::new("kubectl", ["get", "nodes"]).as_user("alice");
        assert_eq!(spec.to_string(), "sudo -u alice -H kubectl get nodes");
    }

    #[test]
    fn display_plain_command() {
        let spec = CmdSpec::new("swapoff", ["-a"]);
        assert_eq!(spec.to_string(), "swapoff -a");
    }

    #[test]
    fn shell_runner_captures_stdout() {
        let spec = CmdSpec::new("echo", ["hello"]);
        let result = ShellRunner.run(&spec).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn shell_runner_reports_nonzero_exit() {
        let spec = CmdSpec::new("false", Vec::<String>::new());
        let result = ShellRunner.run(&spec).unwrap();
        assert!(!result.success());
    }

    #[test]
    fn shell_runner_spawn_failure_is_an_error() {
        let spec = CmdSpec::new("definitely-not-a-real-binary-kubeup", Vec::<String>::new());
        let err = ShellRunner.run(&spec).unwrap_err();
        assert!(matches!(err, ProvisionError::Spawn { .. }));
    }

    #[test]
    fn env_vars_reach_the_child() {
        let spec = CmdSpec::new("sh", ["-c", "echo $KUBEUP_TEST_VAR"]).env("KUBEUP_TEST_VAR", "42");
        let result = ShellRunner.run(&spec).unwrap();
        assert_eq!(result.stdout.trim(), "42");
    }
}
