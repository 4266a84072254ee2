//! Thin wrapper over the helm CLI: idempotent chart-repo registration and
//! pinned install-or-upgrade into a dedicated namespace.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::exec;

/// A pinned chart plus the fixed overrides the bootstrap applies to it.
pub struct HelmChart {
    pub release: &'static str,
    /// Repo-qualified chart reference, e.g. `jetstack/cert-manager`.
    pub chart: &'static str,
    pub repo_name: &'static str,
    pub repo_url: &'static str,
    pub version: &'static str,
    pub namespace: &'static str,
    /// `--set` fragments, mostly minimal resource requests.
    pub values: &'static [&'static str],
}

impl HelmChart {
    fn repo_add_args(&self) -> Vec<&str> {
        // --force-update makes re-registration a no-op instead of an error.
        vec!["repo", "add", self.repo_name, self.repo_url, "--force-update"]
    }

    fn upgrade_args<'a>(&'a self, kubeconfig: &'a str) -> Vec<&'a str> {
        let mut args = vec![
            "upgrade",
            "--install",
            self.release,
            self.chart,
            "--version",
            self.version,
            "--namespace",
            self.namespace,
            "--create-namespace",
            "--kubeconfig",
            kubeconfig,
        ];
        for value in self.values {
            args.push("--set");
            args.push(value);
        }
        args
    }
}

pub async fn ensure_repo(chart: &HelmChart) -> Result<()> {
    exec::run_ok("helm", &chart.repo_add_args())
        .await
        .with_context(|| format!("failed to register chart repo '{}'", chart.repo_name))?;
    Ok(())
}

pub async fn update_repos() -> Result<()> {
    exec::run_ok("helm", &["repo", "update"])
        .await
        .context("helm repo update failed")?;
    Ok(())
}

/// Install or upgrade a release to its pinned version. Idempotent: running
/// against an already converged release is an upgrade to the same chart.
pub async fn install(chart: &HelmChart, kubeconfig: &Path) -> Result<()> {
    info!(
        "installing {} {} into namespace {}",
        chart.chart, chart.version, chart.namespace
    );
    let kubeconfig = kubeconfig.to_string_lossy();
    exec::run_ok("helm", &chart.upgrade_args(&kubeconfig))
        .await
        .with_context(|| format!("helm install failed for release '{}'", chart.release))?;
    Ok(())
}
