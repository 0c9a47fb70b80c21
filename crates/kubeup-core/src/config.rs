use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/kubeup/config.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Target version; the CLI argument overrides this, and the built-in
    /// default applies when both are absent.
    #[serde(default)]
    pub kubernetes_version: Option<String>,

    #[serde(default = "default_pod_network_cidr")]
    pub pod_network_cidr: String,

    #[serde(default = "default_cni_manifest_url")]
    pub cni_manifest_url: String,

    #[serde(default)]
    pub minikube: MinikubeConfig,

    #[serde(default)]
    pub verify: VerifyConfig,
}

fn default_pod_network_cidr() -> String {
    // Flannel's default; kubeadm init and the CNI manifest must agree.
    "10.244.0.0/16".to_string()
}

fn default_cni_manifest_url() -> String {
    "https://github.com/flannel-io/flannel/releases/latest/download/kube-flannel.yml".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubernetes_version: None,
            pod_network_cidr: default_pod_network_cidr(),
            cni_manifest_url: default_cni_manifest_url(),
            minikube: MinikubeConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the default path if it exists,
    /// or fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !cidr_re().is_match(&self.pod_network_cidr) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "pod_network_cidr '{}' is not a CIDR (expected e.g. 10.244.0.0/16)",
                    self.pod_network_cidr
                ),
            });
        }
        if !self.cni_manifest_url.starts_with("http://")
            && !self.cni_manifest_url.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "cni_manifest_url '{}' is not an http(s) URL",
                    self.cni_manifest_url
                ),
            });
        }
        if self.verify.interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "verify.interval_secs is 0; readiness will be polled in a tight loop"
                    .to_string(),
            });
        }
        if self.verify.timeout_secs < self.verify.interval_secs {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "verify.timeout_secs is shorter than verify.interval_secs".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// MinikubeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinikubeConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
}

fn default_driver() -> String {
    "docker".to_string()
}

impl Default for MinikubeConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
        }
    }
}

// ---------------------------------------------------------------------------
// VerifyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfig {
    #[serde(default = "default_verify_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_verify_interval")]
    pub interval_secs: u64,
}

fn default_verify_timeout() -> u64 {
    180
}

fn default_verify_interval() -> u64 {
    5
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_verify_timeout(),
            interval_secs: default_verify_interval(),
        }
    }
}

static CIDR_RE: OnceLock<Regex> = OnceLock::new();

fn cidr_re() -> &'static Regex {
    CIDR_RE.get_or_init(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}/\d{1,2}$").unwrap())
}
