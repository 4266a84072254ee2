//! The canonical bootstrap procedure, strictly sequential: preflight,
//! optional reset, cluster bring-up, kubeconfig materialization, tool
//! installation, optional load-balancer, service exposure, GitOps sync,
//! report. Each step tolerates its own post-condition already holding, so
//! re-running the whole procedure converges instead of resuming.

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::report::Report;
use crate::{
    cluster, expose, gitops, install, kubeapi, kubeconfig, loadbalancer, preflight, provider,
    report, reset,
};

pub async fn run(config: &Config) -> Result<Report> {
    let provider = provider::for_kind(config.provider);
    info!(
        "bootstrapping '{}' via {}",
        config.cluster_name,
        provider.name()
    );

    preflight::ensure_environment(config, provider.as_ref()).await?;

    if config.reset {
        reset::clean(provider.as_ref(), config).await?;
    }

    cluster::ensure(provider.as_ref(), config).await?;
    let kubeconfig = kubeconfig::materialize(provider.as_ref(), config).await?;
    let client = kubeapi::client_for(&kubeconfig).await?;
    cluster::wait_ready(provider.as_ref(), &client, config).await?;

    install::install_all(&client, &kubeconfig).await?;

    match &config.load_balancer {
        Some(lb) => loadbalancer::setup(&client, lb, &kubeconfig).await?,
        None => info!("load balancer disabled, skipping"),
    }

    let ui_address = expose::expose_ui(&client).await?;
    gitops::sync(config).await?;
    let admin_password = report::admin_password(&kubeconfig).await;

    Ok(Report {
        ui_address,
        admin_password,
        kubeconfig,
    })
}
