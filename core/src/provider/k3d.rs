//! Container backend: a k3s cluster hosted in a local container runtime
//! through the `k3d` CLI. The generated kubeconfig already points at a
//! host-mapped loopback port, so no address rewrite is needed.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::ClusterProvider;
use crate::config::Config;
use crate::exec;

pub struct K3dProvider;

impl K3dProvider {
    fn create_args(config: &Config) -> Vec<String> {
        let mut args = vec![
            "cluster".to_string(),
            "create".to_string(),
            config.cluster_name.clone(),
            "--servers".to_string(),
            "1".to_string(),
            "--k3s-arg".to_string(),
            "--disable=traefik@server:0".to_string(),
        ];
        if config.disable_network_policy {
            args.push("--k3s-arg".to_string());
            args.push("--disable-network-policy@server:0".to_string());
        }
        args.push("--wait".to_string());
        args.push("--timeout".to_string());
        args.push("120s".to_string());
        args
    }
}

#[async_trait]
impl ClusterProvider for K3dProvider {
    fn name(&self) -> &'static str {
        "k3d"
    }

    fn tool(&self) -> &'static str {
        "k3d"
    }

    async fn exists(&self, cluster: &str) -> Result<bool> {
        exec::run_status("k3d", &["cluster", "get", cluster]).await
    }

    async fn create(&self, config: &Config) -> Result<()> {
        info!("creating k3d cluster '{}'", config.cluster_name);
        let args = Self::create_args(config);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        exec::run_ok("k3d", &args)
            .await
            .context("k3d cluster create failed")?;
        Ok(())
    }

    async fn destroy(&self, cluster: &str) -> Result<()> {
        let output = exec::run("k3d", &["cluster", "delete", cluster]).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("not found") || stderr.contains("no clusters found") {
            info!("k3d cluster '{cluster}' not present, nothing to delete");
            return Ok(());
        }
        bail!("k3d cluster delete failed: {}", stderr.trim());
    }

    async fn kubeconfig(&self, cluster: &str) -> Result<String> {
        exec::run_ok("k3d", &["kubeconfig", "get", cluster])
            .await
            .context("could not read the k3d kubeconfig")
    }

    async fn external_address(&self, _cluster: &str) -> Result<Option<String>> {
        // k3d publishes the API on a host loopback port; the kubeconfig is
        // reachable as generated.
        Ok(None)
    }

    async fn diagnostics(&self, cluster: &str) -> String {
        let server_node = format!("k3d-{cluster}-server-0");
        exec::run_ok("docker", &["logs", "--tail", "50", &server_node])
            .await
            .unwrap_or_else(|e| format!("(no server logs available: {e:#})"))
    }
}
