//! OS family detection and the per-family package-manager capability table.
//!
//! Only two families are supported. Anything `/etc/os-release` cannot be
//! classified into aborts the run before a single step executes.

use crate::error::{ProvisionError, Result};
use crate::runner::CmdSpec;
use crate::version::KubernetesVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

// ---------------------------------------------------------------------------
// OsFamily
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Debian,
    Rhel,
}

impl OsFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            OsFamily::Debian => "debian",
            OsFamily::Rhel => "rhel",
        }
    }

    pub fn package_manager(self) -> PackageManager {
        match self {
            OsFamily::Debian => PackageManager::Apt,
            OsFamily::Rhel => PackageManager::Dnf,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DetectedOs {
    /// The raw `ID=` value, kept for reporting.
    pub id: String,
    pub family: OsFamily,
}

/// Read `/etc/os-release` and classify the host.
pub fn detect() -> Result<DetectedOs> {
    let data = std::fs::read_to_string(OS_RELEASE_PATH)?;
    classify(&data)
}

/// Classify an os-release document. `ID=` wins; `ID_LIKE=` entries are the
/// fallback for derivatives (e.g. Linux Mint carries `ID_LIKE="ubuntu debian"`).
pub fn classify(os_release: &str) -> Result<DetectedOs> {
    let id = field(os_release, "ID").unwrap_or_default();
    let id_like = field(os_release, "ID_LIKE").unwrap_or_default();

    let family = family_of(&id)
        .or_else(|| id_like.split_whitespace().find_map(family_of))
        .ok_or_else(|| {
            ProvisionError::UnsupportedOs(if id.is_empty() {
                "unknown".to_string()
            } else {
                id.clone()
            })
        })?;

    Ok(DetectedOs { id, family })
}

fn family_of(id: &str) -> Option<OsFamily> {
    match id {
        "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" => Some(OsFamily::Debian),
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "ol" => Some(OsFamily::Rhel),
        _ => None,
    }
}

fn field(os_release: &str, key: &str) -> Option<String> {
    os_release.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix('=')?;
        Some(value.trim().trim_matches('"').to_string())
    })
}

// ---------------------------------------------------------------------------
// PackageManager
// ---------------------------------------------------------------------------

/// Capability table over the two supported package managers. Each method
/// yields the commands a step runs, so OS branching lives here instead of
/// being duplicated across step definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
}

impl PackageManager {
    /// Install packages at whatever version the repositories carry.
    /// Apt refreshes its index first; dnf resolves against metadata itself.
    pub fn install(self, packages: &[&str]) -> Vec<CmdSpec> {
        match self {
            PackageManager::Apt => vec![
                CmdSpec::new("apt-get", ["update"]),
                apt_install(packages.iter().map(|p| p.to_string())),
            ],
            PackageManager::Dnf => vec![dnf_install(packages.iter().map(|p| p.to_string()))],
        }
    }

    /// Install packages pinned to the target Kubernetes version.
    /// Assumes the versioned repository was already added and refreshed.
    pub fn install_pinned(self, packages: &[&str], version: &KubernetesVersion) -> Vec<CmdSpec> {
        match self {
            PackageManager::Apt => {
                let pinned = packages.iter().map(|p| format!("{p}={}", version.deb_pin()));
                vec![apt_install(pinned)]
            }
            PackageManager::Dnf => {
                let pinned = packages.iter().map(|p| format!("{p}-{}", version.rpm_pin()));
                let mut spec = dnf_install(pinned);
                spec.args.push("--disableexcludes=kubernetes".to_string());
                vec![spec]
            }
        }
    }

    /// Prevent unattended upgrades of the given packages. The dnf side is
    /// empty: the kubernetes repo definition carries an `exclude=` line
    /// instead, and pinned installs bypass it with `--disableexcludes`.
    pub fn hold(self, packages: &[&str]) -> Vec<CmdSpec> {
        match self {
            PackageManager::Apt => {
                let mut args = vec!["hold".to_string()];
                args.extend(packages.iter().map(|p| p.to_string()));
                vec![CmdSpec::new("apt-mark", args)]
            }
            PackageManager::Dnf => Vec::new(),
        }
    }

    /// Enable and start a systemd unit. Identical on both families.
    pub fn service_enable(self, unit: &str) -> CmdSpec {
        CmdSpec::new("systemctl", ["enable", "--now", unit])
    }
}

fn apt_install<I: IntoIterator<Item = String>>(packages: I) -> CmdSpec {
    let mut args = vec!["install".to_string(), "-y".to_string()];
    args.extend(packages);
    CmdSpec::new("apt-get", args).env("DEBIAN_FRONTEND", "noninteractive")
}

fn dnf_install<I: IntoIterator<Item = String>>(packages: I) -> CmdSpec {
    let mut args = vec!["install".to_string(), "-y".to_string()];
    args.extend(packages);
    CmdSpec::new("dnf", args)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU: &str = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"22.04\"\n";
    const ROCKY: &str = "NAME=\"Rocky Linux\"\nID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\n";
    const ARCH: &str = "NAME=\"Arch Linux\"\nID=arch\n";
    const MINT: &str = "NAME=\"Linux Mint\"\nID=linuxmint\nID_LIKE=\"ubuntu debian\"\n";

    #[test]
    fn classifies_debian_family() {
        let os = classify(UBUNTU).unwrap();
        assert_eq!(os.family, OsFamily::Debian);
        assert_eq!(os.id, "ubuntu");
    }

    #[test]
    fn classifies_rhel_family() {
        let os = classify(ROCKY).unwrap();
        assert_eq!(os.family, OsFamily::Rhel);
        assert_eq!(os.id, "rocky");
    }

    #[test]
    fn derivative_falls_back_to_id_like() {
        // An unknown ID with a recognized ID_LIKE still classifies.
        let custom = "ID=weirdos\nID_LIKE=\"rhel fedora\"\n";
        assert_eq!(classify(custom).unwrap().family, OsFamily::Rhel);
        assert_eq!(classify(MINT).unwrap().family, OsFamily::Debian);
    }

    #[test]
    fn unknown_id_is_unsupported() {
        let err = classify(ARCH).unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedOs(id) if id == "arch"));
    }

    #[test]
    fn empty_document_is_unsupported() {
        assert!(matches!(
            classify("").unwrap_err(),
            ProvisionError::UnsupportedOs(_)
        ));
    }

    #[test]
    fn apt_install_refreshes_index_first() {
        let cmds = PackageManager::Apt.install(&["containerd"]);
        assert_eq!(cmds[0].program, "apt-get");
        assert_eq!(cmds[0].args, ["update"]);
        assert!(cmds[1].args.contains(&"containerd".to_string()));
        assert!(cmds[1]
            .env
            .contains(&("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())));
    }

    #[test]
    fn pinned_install_uses_full_version() {
        let version: KubernetesVersion = "1.29.1".parse().unwrap();

        let apt = PackageManager::Apt.install_pinned(&["kubelet", "kubeadm"], &version);
        assert_eq!(apt.len(), 1);
        assert!(apt[0].args.contains(&"kubelet=1.29.1-1.1".to_string()));

        let dnf = PackageManager::Dnf.install_pinned(&["kubelet"], &version);
        assert!(dnf[0].args.contains(&"kubelet-1.29.1".to_string()));
        assert!(dnf[0]
            .args
            .contains(&"--disableexcludes=kubernetes".to_string()));
    }

    #[test]
    fn hold_is_apt_only() {
        assert_eq!(PackageManager::Apt.hold(&["kubelet"]).len(), 1);
        assert!(PackageManager::Dnf.hold(&["kubelet"]).is_empty());
    }
}
