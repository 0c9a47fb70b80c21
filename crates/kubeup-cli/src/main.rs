mod cmd;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use kubeup_core::os::OsFamily;
use kubeup_core::ProvisionError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kubeup",
    about = "Provision a single-node Kubernetes cluster on this host",
    version
)]
struct Cli {
    /// Config file (default: /etc/kubeup/config.yaml when present)
    #[arg(long, global = true, env = "KUBEUP_CONFIG")]
    config: Option<PathBuf>,

    /// Output reports as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a full control plane with kubeadm (requires root)
    Kubeadm {
        /// Target Kubernetes version, MAJOR.MINOR.PATCH (default: built-in)
        version: Option<String>,
    },

    /// Provision a local cluster with minikube (requires root)
    Minikube {
        /// Target Kubernetes version for the kubectl client
        version: Option<String>,
    },

    /// Print the resolved step plan without executing anything
    Plan {
        #[arg(value_enum)]
        flow: Flow,

        /// Target Kubernetes version to resolve the plan against
        version: Option<String>,

        /// Pretend the host is this OS family instead of detecting it
        #[arg(long, value_enum)]
        os: Option<OsArg>,
    },

    /// Poll the cluster until the node is Ready and report pod status
    Verify,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Flow {
    Kubeadm,
    Minikube,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum OsArg {
    Debian,
    Rhel,
}

impl From<OsArg> for OsFamily {
    fn from(os: OsArg) -> Self {
        match os {
            OsArg::Debian => OsFamily::Debian,
            OsArg::Rhel => OsFamily::Rhel,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        // Progress narration goes to stderr; stdout carries reports and JSON.
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Kubeadm { version } => cmd::kubeadm::run(config, version.as_deref(), cli.json),
        Commands::Minikube { version } => cmd::minikube::run(config, version.as_deref(), cli.json),
        Commands::Plan { flow, version, os } => {
            cmd::plan::run(config, flow, version.as_deref(), os, cli.json)
        }
        Commands::Verify => cmd::verify::run(config, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// A failing step propagates the external command's own exit code; anything
/// else (unsupported OS, privilege, config, usage) maps to 1.
fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<ProvisionError>() {
        Some(ProvisionError::StepFailed { code, .. }) if *code > 0 => *code,
        _ => 1,
    }
}
