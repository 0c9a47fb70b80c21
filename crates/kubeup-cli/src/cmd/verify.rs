use crate::output::print_json;
use kubeup_core::host::HostContext;
use kubeup_core::runner::ShellRunner;
use kubeup_core::verify;
use std::path::Path;

pub fn run(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let version = super::resolve_version(None, &config)?;
    let host = HostContext::detect(version)?;

    let report = verify::wait_for_ready(&host, &ShellRunner, &config.verify)?;

    if json {
        print_json(&report)?;
        return Ok(());
    }

    if report.node_ready {
        println!("Node Ready after {}s.", report.elapsed_secs);
    } else {
        println!(
            "Node not Ready after {}s (timeout {}s).",
            report.elapsed_secs, config.verify.timeout_secs
        );
    }
    for node in &report.nodes {
        println!("  {node}");
    }
    if !report.pending_pods.is_empty() {
        println!();
        println!("Pods not yet Running:");
        for pod in &report.pending_pods {
            println!("  {pod}");
        }
    }
    Ok(())
}
