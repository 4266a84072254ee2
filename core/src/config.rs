//! Run configuration, read once from the environment at startup.
//!
//! Every recognized variable is enumerated here and validated before any
//! side effect happens. Step functions receive the resulting [`Config`] by
//! reference instead of reading ambient variables themselves.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which backend provisions the cluster instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Ubuntu VM via `multipass`, k3s installed inside the guest.
    Multipass,
    /// Container-based cluster via `k3d` on a local container runtime.
    K3d,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Multipass => "multipass",
            ProviderKind::K3d => "k3d",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "multipass" => Ok(ProviderKind::Multipass),
            "k3d" => Ok(ProviderKind::K3d),
            other => bail!("unknown provider '{other}', expected 'multipass' or 'k3d'"),
        }
    }
}

/// Fixed resource sizing for the VM-backed provider.
#[derive(Clone, Debug)]
pub struct InstanceSize {
    pub cpus: u32,
    pub memory: String,
    pub disk: String,
}

/// Address-pool configuration for the optional load-balancer step.
#[derive(Clone, Debug)]
pub struct LoadBalancerConfig {
    /// Operator-supplied IP range, e.g. `198.51.100.0/28` or
    /// `198.51.100.1-198.51.100.14`. Only validated for non-emptiness; the
    /// operator is responsible for keeping it off the host network's books.
    pub pool: String,
}

/// Companion GitOps repository settings.
#[derive(Clone, Debug)]
pub struct GitopsConfig {
    /// Remote URL. When absent the working copy is initialized locally and
    /// never pushed.
    pub repo_url: Option<String>,
    pub branch: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub provider: ProviderKind,
    pub cluster_name: String,
    pub size: InstanceSize,
    /// Holds the kubeconfig, the session log and the GitOps working copy.
    pub install_dir: PathBuf,
    /// Tear down any prior instance and its persisted state first.
    pub reset: bool,
    pub k3s_channel: String,
    /// The source environments disagree on this flag, so it stays
    /// operator-configurable.
    pub disable_network_policy: bool,
    pub load_balancer: Option<LoadBalancerConfig>,
    pub gitops: GitopsConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::build(&|key| std::env::var(key).ok())
    }

    fn build(get: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let provider = match get("KUBESTRAP_PROVIDER") {
            Some(v) => v.parse()?,
            None => ProviderKind::Multipass,
        };

        let cluster_name = get("KUBESTRAP_CLUSTER_NAME").unwrap_or_else(|| "kubestrap".into());
        if cluster_name.trim().is_empty() {
            bail!("KUBESTRAP_CLUSTER_NAME must not be empty");
        }

        let cpus = match get("KUBESTRAP_CPUS") {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("KUBESTRAP_CPUS is not a number: '{v}'"))?,
            None => 2,
        };
        if cpus == 0 {
            bail!("KUBESTRAP_CPUS must be at least 1");
        }

        let size = InstanceSize {
            cpus,
            memory: get("KUBESTRAP_MEMORY").unwrap_or_else(|| "4G".into()),
            disk: get("KUBESTRAP_DISK").unwrap_or_else(|| "20G".into()),
        };

        let install_dir = match get("KUBESTRAP_DIR") {
            Some(v) => PathBuf::from(v),
            None => match get("HOME") {
                Some(home) => PathBuf::from(home).join(".kubestrap"),
                None => PathBuf::from(".kubestrap"),
            },
        };

        let load_balancer = if parse_bool(get("METALLB_ENABLED").as_deref())? {
            let pool = get("METALLB_POOL").unwrap_or_default();
            if pool.trim().is_empty() {
                bail!("METALLB_ENABLED is set but METALLB_POOL is empty");
            }
            Some(LoadBalancerConfig { pool })
        } else {
            None
        };

        let gitops = GitopsConfig {
            repo_url: get("GITOPS_REPO_URL").filter(|v| !v.trim().is_empty()),
            branch: get("GITOPS_BRANCH").unwrap_or_else(|| "main".into()),
        };

        Ok(Config {
            provider,
            cluster_name,
            size,
            install_dir,
            reset: parse_bool(get("KUBESTRAP_RESET").as_deref())?,
            k3s_channel: get("K3S_CHANNEL").unwrap_or_else(|| "v1.30".into()),
            disable_network_policy: match get("K3S_DISABLE_NETWORK_POLICY") {
                Some(v) => parse_bool(Some(&v))?,
                None => true,
            },
            load_balancer,
            gitops,
        })
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        self.install_dir.join("kubeconfig")
    }

    pub fn log_path(&self) -> PathBuf {
        self.install_dir.join("session.log")
    }

    pub fn gitops_dir(&self) -> PathBuf {
        self.install_dir.join("gitops")
    }
}

fn parse_bool(value: Option<&str>) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => bail!("expected a boolean, got '{other}'"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn build(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::build(&move |key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = build(&[("HOME", "/home/op")]).unwrap();
        assert_eq!(config.provider, ProviderKind::Multipass);
        assert_eq!(config.cluster_name, "kubestrap");
        assert_eq!(config.size.cpus, 2);
        assert!(!config.reset);
        assert!(config.load_balancer.is_none());
        assert_eq!(config.gitops.branch, "main");
        assert_eq!(config.install_dir, PathBuf::from("/home/op/.kubestrap"));
        assert_eq!(
            config.kubeconfig_path(),
            PathBuf::from("/home/op/.kubestrap/kubeconfig")
        );
    }

    #[test]
    fn unknown_provider_is_fatal() {
        assert!(build(&[("KUBESTRAP_PROVIDER", "virtualbox")]).is_err());
    }

    #[test]
    fn metallb_requires_pool() {
        assert!(build(&[("METALLB_ENABLED", "true")]).is_err());

        let config = build(&[
            ("METALLB_ENABLED", "true"),
            ("METALLB_POOL", "198.51.100.0/28"),
        ])
        .unwrap();
        assert_eq!(config.load_balancer.unwrap().pool, "198.51.100.0/28");
    }

    #[test]
    fn disabled_metallb_ignores_pool() {
        let config = build(&[("METALLB_POOL", "198.51.100.0/28")]).unwrap();
        assert!(config.load_balancer.is_none());
    }

    #[test]
    fn bad_sizing_is_fatal() {
        assert!(build(&[("KUBESTRAP_CPUS", "many")]).is_err());
        assert!(build(&[("KUBESTRAP_CPUS", "0")]).is_err());
    }

    #[test]
    fn booleans() {
        assert!(parse_bool(Some("TRUE")).unwrap());
        assert!(parse_bool(Some("yes")).unwrap());
        assert!(!parse_bool(Some("0")).unwrap());
        assert!(!parse_bool(None).unwrap());
        assert!(parse_bool(Some("maybe")).is_err());
    }
}
