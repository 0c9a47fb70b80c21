use crate::error::ProvisionError;
use std::fmt;
use std::str::FromStr;

/// Version installed when neither the CLI nor the config file names one.
pub const DEFAULT_KUBERNETES_VERSION: &str = "1.29.1";

/// Debian package revision appended to the upstream version by pkgs.k8s.io.
const DEB_REVISION: &str = "1.1";

// ---------------------------------------------------------------------------
// KubernetesVersion
// ---------------------------------------------------------------------------

/// A full `MAJOR.MINOR.PATCH` Kubernetes version.
///
/// Repository paths use the minor stream (`1.29`); package pins use the
/// full version (`1.29.1`). Keeping both derivations on one type is what
/// stops them drifting apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KubernetesVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl KubernetesVersion {
    /// The `MAJOR.MINOR` stream used in package repository paths.
    pub fn minor_stream(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// Debian package version pin, e.g. `1.29.1-1.1`.
    pub fn deb_pin(&self) -> String {
        format!("{self}-{DEB_REVISION}")
    }

    /// RPM package version pin, e.g. `1.29.1`.
    pub fn rpm_pin(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for KubernetesVersion {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.strip_prefix('v').unwrap_or(s);
        let mut parts = bare.split('.');
        let invalid = || ProvisionError::InvalidVersion(s.to_string());

        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let patch = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_version() {
        let v: KubernetesVersion = "1.29.1".parse().unwrap();
        assert_eq!(
            v,
            KubernetesVersion {
                major: 1,
                minor: 29,
                patch: 1
            }
        );
    }

    #[test]
    fn accepts_v_prefix() {
        let v: KubernetesVersion = "v1.30.4".parse().unwrap();
        assert_eq!(v.to_string(), "1.30.4");
    }

    #[test]
    fn rejects_partial_and_garbage() {
        assert!("1.29".parse::<KubernetesVersion>().is_err());
        assert!("1.29.1.2".parse::<KubernetesVersion>().is_err());
        assert!("not-a-version".parse::<KubernetesVersion>().is_err());
        assert!("1.29.x".parse::<KubernetesVersion>().is_err());
    }

    #[test]
    fn minor_stream_drops_patch() {
        let v: KubernetesVersion = "1.29.1".parse().unwrap();
        assert_eq!(v.minor_stream(), "1.29");
    }

    #[test]
    fn pins_use_full_version() {
        let v: KubernetesVersion = "1.29.1".parse().unwrap();
        assert_eq!(v.deb_pin(), "1.29.1-1.1");
        assert_eq!(v.rpm_pin(), "1.29.1");
    }
}
