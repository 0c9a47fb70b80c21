use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("must be run as root (try sudo)")]
    NotRoot,

    #[error("step '{step}' failed with exit code {code}: {stderr}")]
    StepFailed {
        step: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to spawn '{program}'")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("download of {url} failed: {detail}")]
    Download { url: String, detail: String },

    #[error("invalid kubernetes version '{0}': expected MAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("home directory not found for user '{0}'")]
    HomeNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
