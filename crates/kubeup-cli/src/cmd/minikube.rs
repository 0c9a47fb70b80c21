use crate::output::print_json;
use anyhow::Context;
use kubeup_core::flows;
use kubeup_core::host::HostContext;
use kubeup_core::runner::ShellRunner;
use kubeup_core::verify;
use std::path::Path;

pub fn run(config_path: Option<&Path>, version: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let version = super::resolve_version(version, &config)?;
    let host = HostContext::detect(version).context("failed to detect host environment")?;
    host.require_root()?;

    tracing::info!(
        "provisioning minikube cluster on {} ({})",
        host.os_id,
        host.os_family
    );

    let runner = ShellRunner;
    let report = flows::minikube_pipeline(&host, &config).run(&host, &runner)?;

    let verify_report = verify::wait_for_ready(&host, &runner, &config.verify)?;
    if !verify_report.node_ready {
        tracing::warn!("cluster not Ready yet; re-check later with `kubeup verify`");
    }

    if json {
        print_json(&serde_json::json!({ "run": report, "verify": verify_report }))?;
        return Ok(());
    }

    println!("minikube cluster provisioned.");
    println!();
    for node in &verify_report.nodes {
        println!("  {node}");
    }
    println!();
    println!("Next steps (as {}):", host.invoking_user);
    println!("  minikube status");
    println!("  kubectl get pods --all-namespaces");
    println!();
    println!(
        "Note: {} may need to log out and back in for docker group membership to apply.",
        host.invoking_user
    );
    Ok(())
}
