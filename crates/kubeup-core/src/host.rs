//! Host identity, gathered once at startup and passed to every step.

use crate::error::{ProvisionError, Result};
use crate::os::{self, OsFamily};
use crate::version::KubernetesVersion;
use std::path::PathBuf;

/// Everything a step is allowed to know about the machine it runs on.
/// Populated once, read-only thereafter; steps never reach for ambient
/// environment state themselves.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub os_family: OsFamily,
    pub os_id: String,
    pub is_root: bool,
    /// The human behind the sudo: `SUDO_USER`, falling back to `USER`.
    /// Cluster-client commands run as this user, not as root.
    pub invoking_user: String,
    /// The invoking user's home directory (kubeconfig lives under it).
    pub home: PathBuf,
    pub kubernetes_version: KubernetesVersion,
}

impl HostContext {
    /// Probe the real host.
    pub fn detect(version: KubernetesVersion) -> Result<Self> {
        let detected = os::detect()?;
        let user = invoking_user();
        let home = home_of(&user)?;
        Ok(Self {
            os_family: detected.family,
            os_id: detected.id,
            is_root: nix::unistd::Uid::effective().is_root(),
            invoking_user: user,
            home,
            kubernetes_version: version,
        })
    }

    /// A context for previewing a plan as if the host were `family`.
    /// Uses the current user identity and never claims root.
    pub fn preview(family: OsFamily, version: KubernetesVersion) -> Self {
        let user = invoking_user();
        let home = home_of(&user).unwrap_or_else(|_| PathBuf::from("/root"));
        Self {
            os_family: family,
            os_id: family.as_str().to_string(),
            is_root: false,
            invoking_user: user,
            home,
            kubernetes_version: version,
        }
    }

    /// Build a context from known parts. Used by tests.
    pub fn assemble(
        family: OsFamily,
        is_root: bool,
        user: &str,
        home: impl Into<PathBuf>,
        version: KubernetesVersion,
    ) -> Self {
        Self {
            os_family: family,
            os_id: family.as_str().to_string(),
            is_root,
            invoking_user: user.to_string(),
            home: home.into(),
            kubernetes_version: version,
        }
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        self.home.join(".kube").join("config")
    }

    pub fn require_root(&self) -> Result<()> {
        if self.is_root {
            Ok(())
        } else {
            Err(ProvisionError::NotRoot)
        }
    }
}

/// `SUDO_USER` → `USER` → `root`. When elevated via sudo this names the
/// real operator, which is who should own the kubeconfig.
pub fn invoking_user() -> String {
    std::env::var("SUDO_USER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "root".to_string())
}

fn home_of(user: &str) -> Result<PathBuf> {
    if user == "root" {
        return Ok(PathBuf::from("/root"));
    }
    // Under sudo, HOME points at root's home; /etc/passwd has the real one.
    if let Ok(passwd) = std::fs::read_to_string("/etc/passwd") {
        if let Some(dir) = passwd_home(&passwd, user) {
            return Ok(dir);
        }
    }
    home::home_dir().ok_or_else(|| ProvisionError::HomeNotFound(user.to_string()))
}

fn passwd_home(passwd: &str, user: &str) -> Option<PathBuf> {
    for line in passwd.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.first() == Some(&user) {
            return fields
                .get(5)
                .filter(|home| !home.is_empty())
                .map(PathBuf::from);
        }
    }
    None
}
