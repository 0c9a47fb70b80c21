//! Post-provisioning cluster verification.
//!
//! A bounded poll against the cluster-client CLI, not a fixed sleep: the
//! node is checked every `interval_secs` until it reports Ready or
//! `timeout_secs` elapses. Verification never fails a pipeline; the report
//! is informational and `kubeup verify` re-runs it on demand.

use crate::config::VerifyConfig;
use crate::error::Result;
use crate::host::HostContext;
use crate::runner::{CmdSpec, CommandRunner};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub node_ready: bool,
    /// Raw `kubectl get nodes` lines from the last poll.
    pub nodes: Vec<String>,
    /// Pods not yet Running/Completed at the time the node went Ready.
    pub pending_pods: Vec<String>,
    pub elapsed_secs: u64,
}

/// Poll until every node reports Ready or the timeout elapses.
pub fn wait_for_ready(
    host: &HostContext,
    runner: &dyn CommandRunner,
    opts: &VerifyConfig,
) -> Result<VerifyReport> {
    let start = Instant::now();
    let deadline = start + Duration::from_secs(opts.timeout_secs);

    loop {
        let nodes = runner.run(&kubectl(host, &["get", "nodes", "--no-headers"]))?;
        if nodes.success() && all_nodes_ready(&nodes.stdout) {
            let pods = runner.run(&kubectl(
                host,
                &["get", "pods", "--all-namespaces", "--no-headers"],
            ))?;
            return Ok(VerifyReport {
                node_ready: true,
                nodes: non_empty_lines(&nodes.stdout),
                pending_pods: pending_pods(&pods.stdout),
                elapsed_secs: start.elapsed().as_secs(),
            });
        }

        if Instant::now() >= deadline {
            tracing::warn!(
                "cluster not ready after {}s; node status: {}",
                opts.timeout_secs,
                nodes.stdout.trim()
            );
            return Ok(VerifyReport {
                node_ready: false,
                nodes: non_empty_lines(&nodes.stdout),
                pending_pods: Vec::new(),
                elapsed_secs: start.elapsed().as_secs(),
            });
        }
        std::thread::sleep(Duration::from_secs(opts.interval_secs));
    }
}

fn kubectl(host: &HostContext, args: &[&str]) -> CmdSpec {
    CmdSpec::new("kubectl", args.iter().copied()).as_user(&host.invoking_user)
}

/// `kubectl get nodes --no-headers` lines look like
/// `cp-node  Ready  control-plane  2m  v1.29.1`; the STATUS column may be
/// comma-joined (`Ready,SchedulingDisabled`). Empty output is not ready.
fn all_nodes_ready(stdout: &str) -> bool {
    let mut saw_node = false;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        saw_node = true;
        let status = line.split_whitespace().nth(1).unwrap_or("");
        if !status.split(',').any(|s| s == "Ready") {
            return false;
        }
    }
    saw_node
}

/// `kubectl get pods -A --no-headers` columns: NAMESPACE NAME READY STATUS …
fn pending_pods(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter(|line| {
            let status = line.split_whitespace().nth(3).unwrap_or("");
            status != "Running" && status != "Completed" && status != "Succeeded"
        })
        .map(str::to_string)
        .collect()
}

fn non_empty_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use crate::os::OsFamily;

    const READY: &str = "cp-node   Ready    control-plane   2m    v1.29.1\n";
    const NOT_READY: &str = "cp-node   NotReady   control-plane   10s   v1.29.1\n";
    const PODS_SETTLED: &str = "\
kube-system   coredns-76f75df574-abcde   1/1   Running     0     2m
kube-system   etcd-cp-node               1/1   Running     0     2m
kube-flannel  kube-flannel-ds-xyz12      1/1   Running     0     1m
";
    const PODS_PENDING: &str = "\
kube-system   coredns-76f75df574-abcde   0/1   Pending     0     10s
kube-system   etcd-cp-node               1/1   Running     0     2m
";

    fn host() -> HostContext {
        HostContext::assemble(
            OsFamily::Debian,
            true,
            "alice",
            "/home/alice",
            "1.29.1".parse().unwrap(),
        )
    }

    fn fast_opts(timeout_secs: u64) -> VerifyConfig {
        VerifyConfig {
            timeout_secs,
            interval_secs: 0,
        }
    }

    #[test]
    fn node_status_parsing() {
        assert!(all_nodes_ready(READY));
        assert!(!all_nodes_ready(NOT_READY));
        assert!(!all_nodes_ready(""));
        assert!(all_nodes_ready(
            "cp-node   Ready,SchedulingDisabled   control-plane   2m   v1.29.1\n"
        ));
    }

    #[test]
    fn pending_pod_parsing() {
        assert!(pending_pods(PODS_SETTLED).is_empty());
        let pending = pending_pods(PODS_PENDING);
        assert_eq!(pending.len(), 1);
        assert!(pending[0].contains("coredns"));
    }

    #[test]
    fn ready_on_first_poll() {
        let runner = ScriptedRunner::new();
        runner.respond_ok("kubectl", READY);
        runner.respond_ok("kubectl", PODS_SETTLED);

        let report = wait_for_ready(&host(), &runner, &fast_opts(30)).unwrap();
        assert!(report.node_ready);
        assert!(report.pending_pods.is_empty());
        assert_eq!(report.nodes.len(), 1);
    }

    #[test]
    fn polls_until_node_becomes_ready() {
        let runner = ScriptedRunner::new();
        runner.respond_ok("kubectl", NOT_READY);
        runner.respond_ok("kubectl", NOT_READY);
        runner.respond_ok("kubectl", READY);
        runner.respond_ok("kubectl", PODS_PENDING);

        let report = wait_for_ready(&host(), &runner, &fast_opts(30)).unwrap();
        assert!(report.node_ready);
        assert_eq!(report.pending_pods.len(), 1);
        // Three node polls plus one pod listing.
        assert_eq!(runner.calls().len(), 4);
    }

    #[test]
    fn timeout_reports_not_ready_without_failing() {
        let runner = ScriptedRunner::new();
        runner.respond_ok("kubectl", NOT_READY);

        let report = wait_for_ready(&host(), &runner, &fast_opts(0)).unwrap();
        assert!(!report.node_ready);
        assert!(report.pending_pods.is_empty());
    }

    #[test]
    fn kubectl_runs_as_the_invoking_user() {
        let runner = ScriptedRunner::new();
        runner.respond_ok("kubectl", READY);
        runner.respond_ok("kubectl", PODS_SETTLED);

        wait_for_ready(&host(), &runner, &fast_opts(30)).unwrap();
        assert!(runner
            .calls()
            .iter()
            .all(|c| c.run_as.as_deref() == Some("alice")));
    }
}
