use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn kubeup() -> Command {
    let mut cmd = Command::cargo_bin("kubeup").unwrap();
    // Keep the host's config file out of the picture.
    cmd.env_remove("KUBEUP_CONFIG");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) -> String {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).unwrap();
    path.display().to_string()
}

// ---------------------------------------------------------------------------
// help / usage
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    kubeup()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("kubeadm"))
        .stdout(predicate::str::contains("minikube"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("verify"));
}

// ---------------------------------------------------------------------------
// kubeup plan
// ---------------------------------------------------------------------------

#[test]
fn plan_kubeadm_debian_lists_full_flow() {
    kubeup()
        .args(["plan", "kubeadm", "--os", "debian"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disable swap"))
        .stdout(predicate::str::contains("add kubernetes package repository"))
        .stdout(predicate::str::contains("initialize control plane"))
        .stdout(predicate::str::contains("remove control-plane taint"));
}

#[test]
fn plan_rhel_includes_selinux_step() {
    kubeup()
        .args(["plan", "kubeadm", "--os", "rhel"])
        .assert()
        .success()
        .stdout(predicate::str::contains("set selinux permissive"));
}

#[test]
fn plan_resolves_version_argument() {
    kubeup()
        .args(["plan", "kubeadm", "1.30.2", "--os", "debian"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kubernetes 1.30.2"));
}

#[test]
fn plan_defaults_to_builtin_version() {
    kubeup()
        .args(["plan", "kubeadm", "--os", "debian"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kubernetes 1.29.1"));
}

#[test]
fn plan_rejects_malformed_version() {
    kubeup()
        .args(["plan", "kubeadm", "not-a-version", "--os", "debian"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid kubernetes version"));
}

#[test]
fn plan_minikube_lists_binary_installs() {
    kubeup()
        .args(["plan", "minikube", "--os", "debian"])
        .assert()
        .success()
        .stdout(predicate::str::contains("install docker"))
        .stdout(predicate::str::contains("install minikube"))
        .stdout(predicate::str::contains("start minikube cluster"));
}

#[test]
fn plan_json_is_machine_readable() {
    let output = kubeup()
        .args(["--json", "plan", "kubeadm", "--os", "debian"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["pipeline"], "kubeadm");
    assert_eq!(value["os"], "debian");
    assert_eq!(value["kubernetes_version"], "1.29.1");
    assert!(value["steps"].as_array().unwrap().len() >= 10);
}

// ---------------------------------------------------------------------------
// configuration
// ---------------------------------------------------------------------------

#[test]
fn config_file_version_is_used() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "kubernetes_version: \"1.28.3\"\n");
    kubeup()
        .args(["--config", &config, "plan", "kubeadm", "--os", "debian"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kubernetes 1.28.3"));
}

#[test]
fn cli_version_overrides_config_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "kubernetes_version: \"1.28.3\"\n");
    kubeup()
        .args(["--config", &config, "plan", "kubeadm", "1.30.0", "--os", "debian"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kubernetes 1.30.0"));
}

#[test]
fn invalid_config_aborts_with_exit_1() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "pod_network_cidr: not-a-cidr\n");
    kubeup()
        .args(["--config", &config, "plan", "kubeadm", "--os", "debian"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn missing_config_file_aborts() {
    kubeup()
        .args(["--config", "/no/such/config.yaml", "plan", "kubeadm", "--os", "debian"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to load configuration"));
}
