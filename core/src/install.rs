//! The management-tool installation sequence.
//!
//! cert-manager goes first because Argo CD and Crossplane request
//! certificates from it; a bounded readiness wait gates the dependents.
//! The remaining tools are order-independent but installed sequentially,
//! and any failure aborts the run since later tools may rely on earlier
//! ones.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use kube::Client;
use tracing::info;

use crate::helm::{self, HelmChart};
use crate::kubeapi;
use crate::retry::{self, PollBudget};

pub const UI_NAMESPACE: &str = "argocd";
pub const UI_SERVICE: &str = "argocd-server";
pub const ADMIN_SECRET: &str = "argocd-initial-admin-secret";

const PREREQ_READY_BUDGET: PollBudget = PollBudget::new(24, Duration::from_secs(5));

/// Certificate-issuing controller; prerequisite for the rest.
pub const CERT_MANAGER: HelmChart = HelmChart {
    release: "cert-manager",
    chart: "jetstack/cert-manager",
    repo_name: "jetstack",
    repo_url: "https://charts.jetstack.io",
    version: "v1.14.4",
    namespace: "cert-manager",
    values: &[
        "installCRDs=true",
        "resources.requests.cpu=10m",
        "resources.requests.memory=32Mi",
    ],
};

/// GitOps controller.
pub const ARGO_CD: HelmChart = HelmChart {
    release: "argocd",
    chart: "argo/argo-cd",
    repo_name: "argo",
    repo_url: "https://argoproj.github.io/argo-helm",
    version: "6.7.11",
    namespace: UI_NAMESPACE,
    values: &[
        "server.resources.requests.cpu=50m",
        "server.resources.requests.memory=64Mi",
        "controller.resources.requests.cpu=100m",
        "controller.resources.requests.memory=128Mi",
    ],
};

/// Multi-tenancy control-plane manager.
pub const VCLUSTER: HelmChart = HelmChart {
    release: "vcluster",
    chart: "loft/vcluster",
    repo_name: "loft",
    repo_url: "https://charts.loft.sh",
    version: "0.19.5",
    namespace: "vcluster",
    values: &[
        "vcluster.resources.requests.cpu=100m",
        "vcluster.resources.requests.memory=128Mi",
    ],
};

/// Infrastructure-provisioning controller.
pub const CROSSPLANE: HelmChart = HelmChart {
    release: "crossplane",
    chart: "crossplane-stable/crossplane",
    repo_name: "crossplane-stable",
    repo_url: "https://charts.crossplane.io/stable",
    version: "1.15.2",
    namespace: "crossplane-system",
    values: &[
        "resourcesCrossplane.requests.cpu=50m",
        "resourcesCrossplane.requests.memory=128Mi",
    ],
};

/// Multi-cluster add-on manager.
pub const SVELTOS: HelmChart = HelmChart {
    release: "projectsveltos",
    chart: "projectsveltos/projectsveltos",
    repo_name: "projectsveltos",
    repo_url: "https://projectsveltos.github.io/helm-charts",
    version: "0.30.0",
    namespace: "projectsveltos",
    values: &[],
};

fn dependents() -> [&'static HelmChart; 4] {
    [&ARGO_CD, &VCLUSTER, &CROSSPLANE, &SVELTOS]
}

pub async fn install_all(client: &Client, kubeconfig: &Path) -> Result<()> {
    for chart in [&CERT_MANAGER, &ARGO_CD, &VCLUSTER, &CROSSPLANE, &SVELTOS] {
        helm::ensure_repo(chart).await?;
    }
    helm::update_repos().await?;

    helm::install(&CERT_MANAGER, kubeconfig).await?;
    wait_webhook_ready(client).await?;

    for chart in dependents() {
        helm::install(chart, kubeconfig).await?;
    }
    info!("all management tools installed");
    Ok(())
}

/// cert-manager's webhook must answer before dependents can request
/// certificates.
async fn wait_webhook_ready(client: &Client) -> Result<()> {
    retry::wait_for("cert-manager webhook ready", PREREQ_READY_BUDGET, || async {
        Ok(kubeapi::deployment_ready(client, CERT_MANAGER.namespace, "cert-manager-webhook")
            .await?
            .then_some(()))
    })
    .await
    .context("cert-manager never became ready; dependent tools were not installed")
}
