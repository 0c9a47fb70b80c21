use crate::output::print_json;
use anyhow::Context;
use kubeup_core::flows;
use kubeup_core::host::HostContext;
use kubeup_core::runner::ShellRunner;
use kubeup_core::verify::{self, VerifyReport};
use std::path::Path;

pub fn run(config_path: Option<&Path>, version: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let version = super::resolve_version(version, &config)?;
    let host = HostContext::detect(version).context("failed to detect host environment")?;
    host.require_root()?;

    tracing::info!(
        "provisioning Kubernetes {} control plane on {} ({})",
        host.kubernetes_version,
        host.os_id,
        host.os_family
    );

    let runner = ShellRunner;
    let report = flows::kubeadm_pipeline(&host, &config).run(&host, &runner)?;

    let verify_report = verify::wait_for_ready(&host, &runner, &config.verify)?;
    if !verify_report.node_ready {
        tracing::warn!("node not Ready yet; re-check later with `kubeup verify`");
    }

    if json {
        print_json(&serde_json::json!({ "run": report, "verify": verify_report }))?;
    } else {
        print_next_steps(&host, &verify_report);
    }
    Ok(())
}

fn print_next_steps(host: &HostContext, verify_report: &VerifyReport) {
    println!("Control plane provisioned.");
    println!();
    for node in &verify_report.nodes {
        println!("  {node}");
    }
    if !verify_report.pending_pods.is_empty() {
        println!();
        println!("Pods still settling:");
        for pod in &verify_report.pending_pods {
            println!("  {pod}");
        }
    }
    println!();
    println!("kubeconfig: {}", host.kubeconfig_path().display());
    println!("Next steps (as {}):", host.invoking_user);
    println!("  kubectl get nodes");
    println!("  kubectl get pods --all-namespaces");
}
