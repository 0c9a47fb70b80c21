//! Idempotence guards: cheap, side-effect-free preconditions that decide
//! whether a step is a no-op on this host.

use crate::error::Result;
use crate::host::HostContext;
use crate::os::OsFamily;
use crate::runner::{CmdSpec, CommandRunner};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// `which` finds the binary.
    BinaryOnPath(String),
    /// The package manager reports the package installed.
    PackageInstalled(String),
    FileExists(PathBuf),
    FileContains { path: PathBuf, needle: String },
    /// `/proc/swaps` lists no active swap device.
    SwapDisabled,
    /// `id -nG <user>` lists the group.
    UserInGroup { user: String, group: String },
}

impl Guard {
    /// One line for plan output and skip logs.
    pub fn describe(&self) -> String {
        match self {
            Guard::BinaryOnPath(name) => format!("`{name}` already on PATH"),
            Guard::PackageInstalled(pkg) => format!("package `{pkg}` already installed"),
            Guard::FileExists(path) => format!("{} exists", path.display()),
            Guard::FileContains { path, needle } => {
                format!("{} contains `{needle}`", path.display())
            }
            Guard::SwapDisabled => "swap already disabled".to_string(),
            Guard::UserInGroup { user, group } => {
                format!("`{user}` already in group `{group}`")
            }
        }
    }

    /// Evaluate the precondition. Package and group probes go through the
    /// runner (read-only queries) so fakes can answer them; PATH and file
    /// probes read the filesystem directly.
    pub fn holds(&self, host: &HostContext, runner: &dyn CommandRunner) -> Result<bool> {
        match self {
            Guard::BinaryOnPath(name) => Ok(which::which(name).is_ok()),
            Guard::PackageInstalled(pkg) => package_installed(host.os_family, pkg, runner),
            Guard::FileExists(path) => Ok(path.exists()),
            Guard::FileContains { path, needle } => {
                if !path.exists() {
                    return Ok(false);
                }
                Ok(std::fs::read_to_string(path)?.contains(needle))
            }
            Guard::SwapDisabled => {
                let swaps = std::fs::read_to_string("/proc/swaps").unwrap_or_default();
                Ok(!swap_active(&swaps))
            }
            Guard::UserInGroup { user, group } => {
                let result = runner.run(&CmdSpec::new("id", ["-nG", user.as_str()]))?;
                Ok(result.success()
                    && result.stdout.split_whitespace().any(|g| g == group))
            }
        }
    }
}

fn package_installed(family: OsFamily, pkg: &str, runner: &dyn CommandRunner) -> Result<bool> {
    match family {
        OsFamily::Debian => {
            let spec = CmdSpec::new("dpkg-query", ["-W", "-f", "${Status}", pkg]);
            let result = runner.run(&spec)?;
            Ok(result.success() && result.stdout.contains("install ok installed"))
        }
        OsFamily::Rhel => {
            let result = runner.run(&CmdSpec::new("rpm", ["-q", pkg]))?;
            Ok(result.success())
        }
    }
}

/// `/proc/swaps` has a header line; any line after it means swap is on.
fn swap_active(proc_swaps: &str) -> bool {
    proc_swaps
        .lines()
        .skip(1)
        .any(|line| !line.trim().is_empty())
}
