use crate::output::{print_json, print_table};
use crate::{Flow, OsArg};
use kubeup_core::flows;
use kubeup_core::host::HostContext;
use kubeup_core::pipeline::Pipeline;
use std::path::Path;

pub fn run(
    config_path: Option<&Path>,
    flow: Flow,
    version: Option<&str>,
    os: Option<OsArg>,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let version = super::resolve_version(version, &config)?;

    let host = match os {
        Some(os) => HostContext::preview(os.into(), version),
        None => HostContext::detect(version)?,
    };

    let pipeline = match flow {
        Flow::Kubeadm => flows::kubeadm_pipeline(&host, &config),
        Flow::Minikube => flows::minikube_pipeline(&host, &config),
    };

    if json {
        print_json(&plan_json(&pipeline, &host))?;
        return Ok(());
    }

    println!(
        "Plan: {} flow on {} (Kubernetes {})",
        pipeline.name, host.os_family, host.kubernetes_version
    );
    println!();
    let rows: Vec<Vec<String>> = pipeline
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            vec![
                (i + 1).to_string(),
                step.name.clone(),
                step.guard
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |g| g.describe()),
            ]
        })
        .collect();
    print_table(&["#", "STEP", "SKIPPED WHEN"], &rows);
    println!();
    println!(
        "Then: poll cluster readiness (informational, timeout {}s)",
        config.verify.timeout_secs
    );
    Ok(())
}

fn plan_json(pipeline: &Pipeline, host: &HostContext) -> serde_json::Value {
    let steps: Vec<serde_json::Value> = pipeline
        .steps
        .iter()
        .map(|step| {
            serde_json::json!({
                "name": step.name,
                "guard": step.guard.as_ref().map(|g| g.describe()),
                "actions": step.actions.len(),
            })
        })
        .collect();
    serde_json::json!({
        "pipeline": pipeline.name,
        "os": host.os_family.as_str(),
        "kubernetes_version": host.kubernetes_version.to_string(),
        "steps": steps,
    })
}
