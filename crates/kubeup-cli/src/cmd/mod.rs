pub mod kubeadm;
pub mod minikube;
pub mod plan;
pub mod verify;

use anyhow::Context;
use kubeup_core::config::{Config, WarnLevel};
use kubeup_core::version::{KubernetesVersion, DEFAULT_KUBERNETES_VERSION};
use kubeup_core::ProvisionError;
use std::path::Path;

/// Load the config file and surface its warnings: warning-level messages go
/// to the log, error-level ones abort before anything runs.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = Config::load(path).context("failed to load configuration")?;
    for warning in config.validate() {
        match warning.level {
            WarnLevel::Warning => tracing::warn!("{}", warning.message),
            WarnLevel::Error => {
                return Err(ProvisionError::InvalidConfig(warning.message).into());
            }
        }
    }
    Ok(config)
}

/// Resolve the target version: CLI argument > config file > built-in default.
pub(crate) fn resolve_version(
    cli_version: Option<&str>,
    config: &Config,
) -> anyhow::Result<KubernetesVersion> {
    let raw = cli_version
        .or(config.kubernetes_version.as_deref())
        .unwrap_or(DEFAULT_KUBERNETES_VERSION);
    Ok(raw.parse()?)
}
