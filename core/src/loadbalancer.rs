//! Optional load-balancer setup. Disabled means skipped entirely; enabled
//! means install MetalLB, wait for its controller, then apply the address
//! pool and its L2 advertisement. An enabled controller that never becomes
//! ready is fatal.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use kube::Client;
use tracing::info;

use crate::config::LoadBalancerConfig;
use crate::helm::{self, HelmChart};
use crate::kubeapi;
use crate::manifests;
use crate::retry::{self, PollBudget};
use crate::exec;

pub const POOL_NAME: &str = "kubestrap-pool";
pub const ADVERTISEMENT_NAME: &str = "kubestrap-l2";

const CONTROLLER_READY_BUDGET: PollBudget = PollBudget::new(24, Duration::from_secs(5));

pub const METALLB: HelmChart = HelmChart {
    release: "metallb",
    chart: "metallb/metallb",
    repo_name: "metallb",
    repo_url: "https://metallb.github.io/metallb",
    version: "0.14.5",
    namespace: manifests::METALLB_NAMESPACE,
    values: &[
        "controller.resources.requests.cpu=25m",
        "controller.resources.requests.memory=32Mi",
    ],
};

pub async fn setup(client: &Client, lb: &LoadBalancerConfig, kubeconfig: &Path) -> Result<()> {
    helm::ensure_repo(&METALLB).await?;
    helm::install(&METALLB, kubeconfig).await?;

    retry::wait_for("MetalLB controller ready", CONTROLLER_READY_BUDGET, || async {
        Ok(
            kubeapi::deployment_ready(client, METALLB.namespace, "metallb-controller")
                .await?
                .then_some(()),
        )
    })
    .await
    .context("MetalLB controller never became ready")?;

    apply(kubeconfig, &manifests::address_pool(POOL_NAME, &lb.pool)).await?;
    apply(
        kubeconfig,
        &manifests::l2_advertisement(ADVERTISEMENT_NAME, POOL_NAME),
    )
    .await?;
    info!("address pool '{}' configured with range {}", POOL_NAME, lb.pool);
    Ok(())
}

async fn apply(kubeconfig: &Path, manifest: &serde_json::Value) -> Result<()> {
    let yaml = manifests::to_yaml(manifest)?;
    let kubeconfig = kubeconfig.to_string_lossy();
    exec::run_with_stdin(
        "kubectl",
        &["--kubeconfig", &kubeconfig, "apply", "-f", "-"],
        &yaml,
    )
    .await
    .context("kubectl apply failed for a MetalLB resource")?;
    Ok(())
}
