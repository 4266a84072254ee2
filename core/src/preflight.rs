//! Preflight: required tools present (installing missing ones through the
//! platform package manager), kubectl within the supported minor range,
//! enough disk, and the k3s download endpoint reachable. Any unmet
//! requirement is fatal and names the dependency.

use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::exec;
use crate::provider::ClusterProvider;

/// kubectl client minors known to talk to the pinned k3s channel.
const SUPPORTED_KUBECTL_MINORS: RangeInclusive<u32> = 27..=31;

const MIN_FREE_DISK_KB: u64 = 10 * 1024 * 1024; // 10 GiB

const K3S_ENDPOINT: (&str, u16) = ("get.k3s.io", 443);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageManager {
    Brew,
    Apt,
}

impl PackageManager {
    pub async fn detect() -> Option<Self> {
        if exec::have("brew").await {
            Some(PackageManager::Brew)
        } else if exec::have("apt-get").await {
            Some(PackageManager::Apt)
        } else {
            None
        }
    }

    /// The install invocation for a tool, or `None` when this package
    /// manager has no way to provide it.
    fn install_command(&self, tool: &str) -> Option<(&'static str, Vec<String>)> {
        let owned = |program: &'static str, args: &[&str]| {
            Some((program, args.iter().map(|a| a.to_string()).collect()))
        };
        match (self, tool) {
            (PackageManager::Brew, "kubectl") => owned("brew", &["install", "kubernetes-cli"]),
            (PackageManager::Brew, "multipass") => {
                owned("brew", &["install", "--cask", "multipass"])
            }
            (PackageManager::Brew, other) => owned("brew", &["install", other]),
            (PackageManager::Apt, "git") => owned("apt-get", &["install", "-y", "git"]),
            (PackageManager::Apt, "kubectl") => {
                owned("snap", &["install", "kubectl", "--classic"])
            }
            (PackageManager::Apt, "helm") => owned("snap", &["install", "helm", "--classic"]),
            (PackageManager::Apt, "multipass") => owned("snap", &["install", "multipass"]),
            (PackageManager::Apt, _) => None,
        }
    }

    async fn install(&self, tool: &str) -> Result<()> {
        let (program, args) = self
            .install_command(tool)
            .with_context(|| format!("no install recipe for required dependency '{tool}'"))?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        exec::run_ok(program, &args)
            .await
            .with_context(|| format!("failed to install required dependency '{tool}'"))?;
        Ok(())
    }
}

pub async fn ensure_environment(config: &Config, provider: &dyn ClusterProvider) -> Result<()> {
    let required = [provider.tool(), "kubectl", "helm", "git"];
    let pm = PackageManager::detect().await;

    for tool in required {
        if exec::have(tool).await {
            continue;
        }
        let Some(pm) = pm else {
            bail!("required dependency '{tool}' is missing and no package manager was found");
        };
        info!("installing missing dependency '{tool}'");
        pm.install(tool).await?;
        if !exec::have(tool).await {
            bail!("required dependency '{tool}' is still missing after installation");
        }
    }

    ensure_kubectl_version(pm).await?;
    ensure_disk_space(config).await?;
    ensure_network().await?;
    Ok(())
}

async fn ensure_kubectl_version(pm: Option<PackageManager>) -> Result<()> {
    let minor = kubectl_client_minor().await?;
    if SUPPORTED_KUBECTL_MINORS.contains(&minor) {
        return Ok(());
    }
    warn!(
        "kubectl client 1.{minor} is outside the supported range 1.{}..1.{}, reinstalling",
        SUPPORTED_KUBECTL_MINORS.start(),
        SUPPORTED_KUBECTL_MINORS.end()
    );
    let Some(pm) = pm else {
        bail!("kubectl 1.{minor} is unsupported and no package manager is available to replace it");
    };
    pm.install("kubectl").await?;
    let minor = kubectl_client_minor().await?;
    if !SUPPORTED_KUBECTL_MINORS.contains(&minor) {
        bail!("kubectl client 1.{minor} is still outside the supported range after reinstall");
    }
    Ok(())
}

async fn kubectl_client_minor() -> Result<u32> {
    let raw = exec::run_ok("kubectl", &["version", "--client", "--output", "json"]).await?;
    parse_client_minor(&raw)
}

fn parse_client_minor(raw: &str) -> Result<u32> {
    let version: serde_json::Value =
        serde_json::from_str(raw).context("unparsable 'kubectl version' output")?;
    let minor = version["clientVersion"]["minor"]
        .as_str()
        .context("kubectl version output has no clientVersion.minor")?;
    // GKE-style builds report e.g. "30+".
    let digits: String = minor.chars().take_while(char::is_ascii_digit).collect();
    digits
        .parse()
        .with_context(|| format!("kubectl reported a non-numeric minor version '{minor}'"))
}

async fn ensure_disk_space(config: &Config) -> Result<()> {
    let dir = config.install_dir.to_string_lossy().to_string();
    // The install dir may not exist yet; its parent's filesystem is the one
    // that matters.
    let probe = if config.install_dir.exists() {
        dir
    } else {
        config
            .install_dir
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string())
    };
    let raw = exec::run_ok("df", &["-Pk", &probe]).await?;
    match parse_df_available_kb(&raw) {
        Some(available) if available < MIN_FREE_DISK_KB => {
            bail!(
                "not enough disk space under {probe}: {} MiB free, need {} MiB",
                available / 1024,
                MIN_FREE_DISK_KB / 1024
            );
        }
        Some(_) => Ok(()),
        None => {
            warn!("could not parse df output, skipping disk-space check");
            Ok(())
        }
    }
}

fn parse_df_available_kb(raw: &str) -> Option<u64> {
    raw.lines()
        .nth(1)?
        .split_whitespace()
        .nth(3)?
        .parse()
        .ok()
}

async fn ensure_network() -> Result<()> {
    let (host, port) = K3S_ENDPOINT;
    tokio::time::timeout(
        Duration::from_secs(5),
        tokio::net::TcpStream::connect((host, port)),
    )
    .await
    .map_err(|_| anyhow::anyhow!("connection to {host}:{port} timed out"))?
    .with_context(|| format!("cannot reach {host}:{port}; check network connectivity"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubectl_minor_is_parsed() {
        let raw = r#"{"clientVersion":{"major":"1","minor":"30","gitVersion":"v1.30.2"}}"#;
        assert_eq!(parse_client_minor(raw).unwrap(), 30);
    }

    #[test]
    fn vendor_suffixed_minor_is_parsed() {
        let raw = r#"{"clientVersion":{"major":"1","minor":"29+"}}"#;
        assert_eq!(parse_client_minor(raw).unwrap(), 29);
    }

    #[test]
    fn garbage_version_output_is_an_error() {
        assert!(parse_client_minor("not json").is_err());
        assert!(parse_client_minor(r#"{"clientVersion":{}}"#).is_err());
    }

    #[test]
    fn df_available_column_is_parsed() {
        let raw = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                   /dev/sda1 102400000 2048000 90000000 3% /\n";
        assert_eq!(parse_df_available_kb(raw), Some(90_000_000));
    }

    #[test]
    fn unparsable_df_is_none() {
        assert_eq!(parse_df_available_kb("oops"), None);
    }

    #[test]
    fn apt_has_no_recipe_for_k3d() {
        assert!(PackageManager::Apt.install_command("k3d").is_none());
        assert!(PackageManager::Brew.install_command("k3d").is_some());
    }
}
