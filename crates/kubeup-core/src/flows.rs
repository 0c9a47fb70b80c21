//! The step catalogs: everything the two provisioning flows actually do.
//!
//! Steps are fully resolved here, at pipeline-definition time, against the
//! host context and config. Execution later on never consults ambient state.

use crate::config::Config;
use crate::guard::Guard;
use crate::host::HostContext;
use crate::os::{OsFamily, PackageManager};
use crate::pipeline::Pipeline;
use crate::runner::CmdSpec;
use crate::step::{Action, Step};
use std::path::PathBuf;

pub const MODULES_LOAD_FILE: &str = "/etc/modules-load.d/k8s.conf";
pub const SYSCTL_FILE: &str = "/etc/sysctl.d/k8s.conf";
pub const CONTAINERD_CONFIG: &str = "/etc/containerd/config.toml";
pub const APT_KEYRING: &str = "/etc/apt/keyrings/kubernetes-apt-keyring.asc";
pub const APT_SOURCE_LIST: &str = "/etc/apt/sources.list.d/kubernetes.list";
pub const YUM_REPO_FILE: &str = "/etc/yum.repos.d/kubernetes.repo";
pub const DOCKER_CE_REPO_FILE: &str = "/etc/yum.repos.d/docker-ce.repo";
pub const DOCKER_CE_REPO_URL: &str = "https://download.docker.com/linux/centos/docker-ce.repo";
pub const ADMIN_CONF: &str = "/etc/kubernetes/admin.conf";
pub const MINIKUBE_RELEASE_URL: &str =
    "https://storage.googleapis.com/minikube/releases/latest/minikube-linux-amd64";

const KERNEL_MODULES: [&str; 2] = ["overlay", "br_netfilter"];
const SYSCTL_CONF: &str = "\
net.bridge.bridge-nf-call-iptables  = 1
net.bridge.bridge-nf-call-ip6tables = 1
net.ipv4.ip_forward                 = 1
";

const KUBE_PACKAGES: [&str; 3] = ["kubelet", "kubeadm", "kubectl"];

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// Full bare-metal-style control-plane install.
pub fn kubeadm_pipeline(host: &HostContext, config: &Config) -> Pipeline {
    let pm = host.os_family.package_manager();
    let mut steps = vec![disable_swap()];
    if host.os_family == OsFamily::Rhel {
        steps.push(selinux_permissive());
    }
    steps.extend([
        kernel_modules(),
        sysctl_params(),
        install_containerd(host, pm),
        configure_containerd(pm),
        kubernetes_repo(host),
        install_kube_packages(host, pm),
        kubeadm_init(config),
        user_kubeconfig(host),
        install_cni(host, config),
        remove_taint(host),
    ]);
    Pipeline::new("kubeadm", steps)
}

/// Local cluster via the minikube binary, driven as the invoking user.
pub fn minikube_pipeline(host: &HostContext, config: &Config) -> Pipeline {
    let pm = host.os_family.package_manager();
    Pipeline::new(
        "minikube",
        vec![
            install_docker(host, pm),
            docker_group(host),
            install_kubectl_binary(host),
            install_minikube_binary(),
            start_minikube(host, config),
        ],
    )
}

// ---------------------------------------------------------------------------
// Shared host preparation
// ---------------------------------------------------------------------------

fn disable_swap() -> Step {
    // kubelet refuses to start with swap on; commenting fstab keeps it off
    // across reboots.
    Step::new(
        "disable swap",
        Some(Guard::SwapDisabled),
        vec![
            Action::Run(CmdSpec::new("swapoff", ["-a"])),
            Action::CommentLines {
                path: PathBuf::from("/etc/fstab"),
                needle: "swap".to_string(),
            },
        ],
    )
}

fn selinux_permissive() -> Step {
    Step::new(
        "set selinux permissive",
        Some(Guard::FileContains {
            path: PathBuf::from("/etc/selinux/config"),
            needle: "SELINUX=permissive".to_string(),
        }),
        vec![
            // Fails when selinux is already disabled; that is fine.
            Action::Run(CmdSpec::new("setenforce", ["0"]).allow_failure()),
            Action::ReplaceOnce {
                path: PathBuf::from("/etc/selinux/config"),
                from: "SELINUX=enforcing".to_string(),
                to: "SELINUX=permissive".to_string(),
            },
        ],
    )
}

fn kernel_modules() -> Step {
    let mut actions = Vec::new();
    for module in KERNEL_MODULES {
        actions.push(Action::EnsureLine {
            path: PathBuf::from(MODULES_LOAD_FILE),
            line: module.to_string(),
        });
        actions.push(Action::Run(CmdSpec::new("modprobe", [module])));
    }
    Step::new(
        "load kernel modules",
        Some(Guard::FileExists(PathBuf::from(MODULES_LOAD_FILE))),
        actions,
    )
}

fn sysctl_params() -> Step {
    Step::new(
        "set sysctl parameters",
        Some(Guard::FileExists(PathBuf::from(SYSCTL_FILE))),
        vec![
            Action::WriteFile {
                path: PathBuf::from(SYSCTL_FILE),
                contents: SYSCTL_CONF.to_string(),
                mode: None,
            },
            Action::Run(CmdSpec::new("sysctl", ["--system"])),
        ],
    )
}

// ---------------------------------------------------------------------------
// Container runtime
// ---------------------------------------------------------------------------

fn install_containerd(host: &HostContext, pm: PackageManager) -> Step {
    let mut actions = Vec::new();
    let package = match host.os_family {
        OsFamily::Debian => "containerd",
        OsFamily::Rhel => {
            // containerd.io ships from the Docker CE repository.
            actions.push(Action::Download {
                url: DOCKER_CE_REPO_URL.to_string(),
                path: PathBuf::from(DOCKER_CE_REPO_FILE),
                mode: None,
            });
            "containerd.io"
        }
    };
    actions.extend(pm.install(&[package]).into_iter().map(Action::Run));
    actions.push(Action::Run(pm.service_enable("containerd")));
    Step::new(
        "install containerd",
        Some(Guard::BinaryOnPath("containerd".to_string())),
        actions,
    )
}

fn configure_containerd(pm: PackageManager) -> Step {
    Step::new(
        "configure containerd",
        Some(Guard::FileContains {
            path: PathBuf::from(CONTAINERD_CONFIG),
            needle: "SystemdCgroup = true".to_string(),
        }),
        vec![
            Action::CaptureToFile {
                spec: CmdSpec::new("containerd", ["config", "default"]),
                path: PathBuf::from(CONTAINERD_CONFIG),
            },
            // kubelet and containerd must agree on the systemd cgroup driver.
            Action::ReplaceOnce {
                path: PathBuf::from(CONTAINERD_CONFIG),
                from: "SystemdCgroup = false".to_string(),
                to: "SystemdCgroup = true".to_string(),
            },
            Action::Run(CmdSpec::new("systemctl", ["restart", "containerd"])),
            Action::Run(pm.service_enable("containerd")),
        ],
    )
}

// ---------------------------------------------------------------------------
// Kubernetes packages
// ---------------------------------------------------------------------------

fn deb_repo_url(host: &HostContext) -> String {
    format!(
        "https://pkgs.k8s.io/core:/stable:/v{}/deb/",
        host.kubernetes_version.minor_stream()
    )
}

fn rpm_repo_url(host: &HostContext) -> String {
    format!(
        "https://pkgs.k8s.io/core:/stable:/v{}/rpm/",
        host.kubernetes_version.minor_stream()
    )
}

fn kubernetes_repo(host: &HostContext) -> Step {
    match host.os_family {
        OsFamily::Debian => {
            let repo_url = deb_repo_url(host);
            Step::new(
                "add kubernetes package repository",
                // Guarded on the versioned URL: bumping the target minor
                // stream re-runs this step instead of skipping it.
                Some(Guard::FileContains {
                    path: PathBuf::from(APT_SOURCE_LIST),
                    needle: repo_url.clone(),
                }),
                vec![
                    Action::Download {
                        url: format!("{repo_url}Release.key"),
                        path: PathBuf::from(APT_KEYRING),
                        mode: Some(0o644),
                    },
                    Action::WriteFile {
                        path: PathBuf::from(APT_SOURCE_LIST),
                        contents: format!("deb [signed-by={APT_KEYRING}] {repo_url} /\n"),
                        mode: Some(0o644),
                    },
                    Action::Run(CmdSpec::new("apt-get", ["update"])),
                ],
            )
        }
        OsFamily::Rhel => {
            let repo_url = rpm_repo_url(host);
            let definition = format!(
                "[kubernetes]\n\
                 name=Kubernetes\n\
                 baseurl={repo_url}\n\
                 enabled=1\n\
                 gpgcheck=1\n\
                 gpgkey={repo_url}repodata/repomd.xml.key\n\
                 exclude=kubelet kubeadm kubectl cri-tools kubernetes-cni\n"
            );
            Step::new(
                "add kubernetes package repository",
                Some(Guard::FileContains {
                    path: PathBuf::from(YUM_REPO_FILE),
                    needle: repo_url,
                }),
                vec![Action::WriteFile {
                    path: PathBuf::from(YUM_REPO_FILE),
                    contents: definition,
                    mode: Some(0o644),
                }],
            )
        }
    }
}

fn install_kube_packages(host: &HostContext, pm: PackageManager) -> Step {
    let version = &host.kubernetes_version;
    let mut actions: Vec<Action> = pm
        .install_pinned(&KUBE_PACKAGES, version)
        .into_iter()
        .map(Action::Run)
        .collect();
    actions.extend(pm.hold(&KUBE_PACKAGES).into_iter().map(Action::Run));
    actions.push(Action::Run(pm.service_enable("kubelet")));
    Step::new(
        "install kubelet kubeadm kubectl",
        Some(Guard::BinaryOnPath("kubeadm".to_string())),
        actions,
    )
}

// ---------------------------------------------------------------------------
// Control plane
// ---------------------------------------------------------------------------

fn kubeadm_init(config: &Config) -> Step {
    Step::new(
        "initialize control plane",
        Some(Guard::FileExists(PathBuf::from(ADMIN_CONF))),
        vec![Action::Run(CmdSpec::new(
            "kubeadm",
            [
                "init".to_string(),
                format!("--pod-network-cidr={}", config.pod_network_cidr),
            ],
        ))],
    )
}

fn user_kubeconfig(host: &HostContext) -> Step {
    let kube_dir = host.home.join(".kube");
    let kubeconfig = host.kubeconfig_path();
    // `user:` (empty group) resolves to the user's login group.
    let owner = format!("{}:", host.invoking_user);
    Step::new(
        format!("install kubeconfig for {}", host.invoking_user),
        Some(Guard::FileExists(kubeconfig.clone())),
        vec![
            Action::Run(CmdSpec::new(
                "mkdir",
                ["-p".to_string(), kube_dir.display().to_string()],
            )),
            Action::Run(CmdSpec::new(
                "cp",
                [ADMIN_CONF.to_string(), kubeconfig.display().to_string()],
            )),
            Action::Run(CmdSpec::new(
                "chown",
                ["-R".to_string(), owner, kube_dir.display().to_string()],
            )),
        ],
    )
}

fn install_cni(host: &HostContext, config: &Config) -> Step {
    Step::new(
        "install flannel cni",
        // `kubectl apply` is idempotent; no guard needed.
        None,
        vec![Action::Run(
            CmdSpec::new("kubectl", ["apply", "-f", config.cni_manifest_url.as_str()])
                .as_user(&host.invoking_user),
        )],
    )
}

fn remove_taint(host: &HostContext) -> Step {
    Step::new(
        "remove control-plane taint",
        None,
        vec![Action::Run(
            CmdSpec::new(
                "kubectl",
                ["taint", "nodes", "--all", "node-role.kubernetes.io/control-plane-"],
            )
            .as_user(&host.invoking_user)
            // Exits non-zero when the taint is already gone.
            .allow_failure(),
        )],
    )
}

// ---------------------------------------------------------------------------
// Minikube flow
// ---------------------------------------------------------------------------

fn install_docker(host: &HostContext, pm: PackageManager) -> Step {
    let mut actions = Vec::new();
    match host.os_family {
        OsFamily::Debian => {
            actions.extend(pm.install(&["docker.io"]).into_iter().map(Action::Run));
        }
        OsFamily::Rhel => {
            actions.push(Action::Download {
                url: DOCKER_CE_REPO_URL.to_string(),
                path: PathBuf::from(DOCKER_CE_REPO_FILE),
                mode: None,
            });
            actions.extend(
                pm.install(&["docker-ce", "docker-ce-cli", "containerd.io"])
                    .into_iter()
                    .map(Action::Run),
            );
        }
    }
    actions.push(Action::Run(pm.service_enable("docker")));
    Step::new(
        "install docker",
        Some(Guard::BinaryOnPath("docker".to_string())),
        actions,
    )
}

fn docker_group(host: &HostContext) -> Step {
    Step::new(
        format!("add {} to docker group", host.invoking_user),
        Some(Guard::UserInGroup {
            user: host.invoking_user.clone(),
            group: "docker".to_string(),
        }),
        vec![Action::Run(CmdSpec::new(
            "usermod",
            ["-aG", "docker", host.invoking_user.as_str()],
        ))],
    )
}

fn install_kubectl_binary(host: &HostContext) -> Step {
    Step::new(
        "install kubectl",
        Some(Guard::BinaryOnPath("kubectl".to_string())),
        vec![Action::Download {
            url: format!(
                "https://dl.k8s.io/release/v{}/bin/linux/amd64/kubectl",
                host.kubernetes_version
            ),
            path: PathBuf::from("/usr/local/bin/kubectl"),
            mode: Some(0o755),
        }],
    )
}

fn install_minikube_binary() -> Step {
    Step::new(
        "install minikube",
        Some(Guard::BinaryOnPath("minikube".to_string())),
        vec![Action::Download {
            url: MINIKUBE_RELEASE_URL.to_string(),
            path: PathBuf::from("/usr/local/bin/minikube"),
            mode: Some(0o755),
        }],
    )
}

fn start_minikube(host: &HostContext, config: &Config) -> Step {
    Step::new(
        "start minikube cluster",
        None,
        vec![Action::Run(
            CmdSpec::new(
                "minikube",
                ["start".to_string(), format!("--driver={}", config.minikube.driver)],
            )
            .as_user(&host.invoking_user),
        )],
    )
}
