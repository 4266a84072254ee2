//! VM backend: an Ubuntu guest launched with `multipass`, k3s installed
//! inside it through the upstream install script.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::ClusterProvider;
use crate::config::Config;
use crate::exec;

pub struct MultipassProvider;

impl MultipassProvider {
    fn k3s_install_script(config: &Config) -> String {
        let mut flags = String::from("--disable traefik --write-kubeconfig-mode 644");
        if config.disable_network_policy {
            flags.push_str(" --disable-network-policy");
        }
        flags.push_str(" --flannel-backend vxlan");
        format!(
            "curl -sfL https://get.k3s.io | INSTALL_K3S_CHANNEL={} sh -s - server {}",
            config.k3s_channel, flags
        )
    }
}

#[async_trait]
impl ClusterProvider for MultipassProvider {
    fn name(&self) -> &'static str {
        "multipass"
    }

    fn tool(&self) -> &'static str {
        "multipass"
    }

    async fn exists(&self, cluster: &str) -> Result<bool> {
        exec::run_status("multipass", &["info", cluster]).await
    }

    async fn create(&self, config: &Config) -> Result<()> {
        let cpus = config.size.cpus.to_string();
        info!(
            "launching VM '{}' ({} cpus, {} memory, {} disk)",
            config.cluster_name, cpus, config.size.memory, config.size.disk
        );
        exec::run_ok(
            "multipass",
            &[
                "launch",
                "--name",
                &config.cluster_name,
                "--cpus",
                &cpus,
                "--memory",
                &config.size.memory,
                "--disk",
                &config.size.disk,
            ],
        )
        .await
        .context("multipass launch failed")?;

        info!("installing k3s (channel {})", config.k3s_channel);
        let script = Self::k3s_install_script(config);
        exec::run_ok(
            "multipass",
            &["exec", &config.cluster_name, "--", "bash", "-c", &script],
        )
        .await
        .context("k3s installation inside the VM failed")?;
        Ok(())
    }

    async fn destroy(&self, cluster: &str) -> Result<()> {
        let output = exec::run("multipass", &["delete", "--purge", cluster]).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("does not exist") {
            info!("VM '{cluster}' not present, nothing to delete");
            return Ok(());
        }
        bail!("multipass delete failed: {}", stderr.trim());
    }

    async fn kubeconfig(&self, cluster: &str) -> Result<String> {
        exec::run_ok(
            "multipass",
            &[
                "exec",
                cluster,
                "--",
                "sudo",
                "cat",
                "/etc/rancher/k3s/k3s.yaml",
            ],
        )
        .await
        .context("could not read k3s.yaml from the VM")
    }

    async fn external_address(&self, cluster: &str) -> Result<Option<String>> {
        let raw = exec::run_ok("multipass", &["info", cluster, "--format", "json"]).await?;
        let info: Value =
            serde_json::from_str(&raw).context("unparsable 'multipass info' output")?;
        Ok(first_ipv4(&info, cluster))
    }

    async fn diagnostics(&self, cluster: &str) -> String {
        exec::run_ok(
            "multipass",
            &[
                "exec",
                cluster,
                "--",
                "sudo",
                "journalctl",
                "-u",
                "k3s",
                "-n",
                "50",
                "--no-pager",
            ],
        )
        .await
        .unwrap_or_else(|e| format!("(no k3s logs available: {e:#})"))
    }
}

fn first_ipv4(info: &Value, cluster: &str) -> Option<String> {
    info["info"][cluster]["ipv4"]
        .as_array()?
        .first()?
        .as_str()
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GitopsConfig, InstanceSize, ProviderKind};
    use std::path::PathBuf;

    fn config(disable_network_policy: bool) -> Config {
        Config {
            provider: ProviderKind::Multipass,
            cluster_name: "demo".into(),
            size: InstanceSize {
                cpus: 2,
                memory: "4G".into(),
                disk: "20G".into(),
            },
            install_dir: PathBuf::from("/tmp/kubestrap"),
            reset: false,
            k3s_channel: "v1.30".into(),
            disable_network_policy,
            load_balancer: None,
            gitops: GitopsConfig {
                repo_url: None,
                branch: "main".into(),
            },
        }
    }

    #[test]
    fn install_script_pins_channel_and_disables_bundled_ingress() {
        let script = MultipassProvider::k3s_install_script(&config(true));
        assert!(script.contains("INSTALL_K3S_CHANNEL=v1.30"));
        assert!(script.contains("--disable traefik"));
        assert!(script.contains("--disable-network-policy"));
        assert!(script.contains("--flannel-backend vxlan"));
    }

    #[test]
    fn network_policy_disable_is_optional() {
        let script = MultipassProvider::k3s_install_script(&config(false));
        assert!(!script.contains("--disable-network-policy"));
    }

    #[test]
    fn ipv4_is_taken_from_instance_info() {
        let info: Value = serde_json::from_str(
            r#"{"info":{"demo":{"ipv4":["192.0.2.10","10.42.0.1"],"state":"Running"}}}"#,
        )
        .unwrap();
        assert_eq!(first_ipv4(&info, "demo"), Some("192.0.2.10".to_string()));
        assert_eq!(first_ipv4(&info, "other"), None);
    }
}
