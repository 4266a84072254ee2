//! Kubeconfig materialization: copy the credentials generated inside the
//! instance to the install directory, rewrite loopback server addresses to
//! the instance's reachable address, and lock the file down to owner-only
//! access. Every later step depends on this file being valid.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use kube::config::Kubeconfig;
use tracing::info;

use crate::config::Config;
use crate::provider::ClusterProvider;

pub async fn materialize(provider: &dyn ClusterProvider, config: &Config) -> Result<PathBuf> {
    let raw = provider.kubeconfig(&config.cluster_name).await?;
    let mut parsed: Kubeconfig =
        serde_yaml::from_str(&raw).context("cluster produced an unparsable kubeconfig")?;
    if parsed.clusters.is_empty() || parsed.auth_infos.is_empty() {
        bail!("cluster produced a kubeconfig without clusters or credentials");
    }

    if let Some(address) = provider.external_address(&config.cluster_name).await? {
        for named in &mut parsed.clusters {
            if let Some(cluster) = &mut named.cluster {
                if let Some(server) = &cluster.server {
                    cluster.server = Some(rewrite_loopback(server, &address));
                }
            }
        }
    }

    let path = config.kubeconfig_path();
    fs::create_dir_all(&config.install_dir)?;
    fs::write(&path, serde_yaml::to_string(&parsed)?)
        .with_context(|| format!("cannot write kubeconfig to {}", path.display()))?;
    restrict_permissions(&path)?;
    info!("kubeconfig written to {}", path.display());
    Ok(path)
}

/// Substitute the reachable address for a loopback host, keeping scheme and
/// port. Non-loopback servers are left alone.
fn rewrite_loopback(server: &str, address: &str) -> String {
    let Some((scheme, rest)) = server.split_once("://") else {
        return server.to_string();
    };
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };
    if !matches!(host, "127.0.0.1" | "localhost" | "0.0.0.0") {
        return server.to_string();
    }
    match port {
        Some(port) => format!("{scheme}://{address}:{port}"),
        None => format!("{scheme}://{address}"),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("cannot restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_is_rewritten_with_port_kept() {
        assert_eq!(
            rewrite_loopback("https://127.0.0.1:6443", "192.0.2.10"),
            "https://192.0.2.10:6443"
        );
        assert_eq!(
            rewrite_loopback("https://localhost:6443", "192.0.2.10"),
            "https://192.0.2.10:6443"
        );
    }

    #[test]
    fn non_loopback_servers_are_untouched() {
        assert_eq!(
            rewrite_loopback("https://10.0.0.5:6443", "192.0.2.10"),
            "https://10.0.0.5:6443"
        );
    }

    #[test]
    fn schemeless_values_pass_through() {
        assert_eq!(rewrite_loopback("127.0.0.1", "192.0.2.10"), "127.0.0.1");
    }

    #[test]
    fn portless_loopback_is_rewritten() {
        assert_eq!(
            rewrite_loopback("https://127.0.0.1", "192.0.2.10"),
            "https://192.0.2.10"
        );
    }
}
