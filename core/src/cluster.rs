//! Cluster bring-up: create the instance unless one with the target name
//! already exists, then wait (bounded) for every node to report ready.
//! A readiness timeout is fatal and surfaces the instance's logs.

use std::time::Duration;

use anyhow::{Context, Result};
use kube::Client;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::kubeapi;
use crate::provider::ClusterProvider;
use crate::retry::{self, PollBudget};

const NODE_READY_BUDGET: PollBudget = PollBudget::new(24, Duration::from_secs(5));

/// Create the instance if needed. Re-runs against an existing instance skip
/// creation entirely; readiness is verified afterwards either way.
pub async fn ensure(provider: &dyn ClusterProvider, config: &Config) -> Result<()> {
    if provider.exists(&config.cluster_name).await? {
        info!(
            "{} instance '{}' already exists, skipping creation",
            provider.name(),
            config.cluster_name
        );
        return Ok(());
    }
    provider.create(config).await
}

/// Bounded wait for all nodes ready. API connection errors count as "not
/// ready yet" while the control plane is still coming up.
pub async fn wait_ready(
    provider: &dyn ClusterProvider,
    client: &Client,
    config: &Config,
) -> Result<()> {
    let outcome = retry::wait_for("all nodes ready", NODE_READY_BUDGET, || async {
        match kubeapi::nodes_ready(client).await {
            Ok(true) => Ok(Some(())),
            Ok(false) => Ok(None),
            Err(e) => {
                debug!("API not answering yet: {e:#}");
                Ok(None)
            }
        }
    })
    .await;

    if outcome.is_err() {
        let logs = provider.diagnostics(&config.cluster_name).await;
        error!(
            "cluster '{}' never became ready; recent instance logs:\n{logs}",
            config.cluster_name
        );
    }
    outcome.context("cluster bring-up failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GitopsConfig, InstanceSize, ProviderKind};
    use anyhow::bail;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeProvider {
        exists: bool,
        created: AtomicBool,
    }

    #[async_trait]
    impl ClusterProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn tool(&self) -> &'static str {
            "fake"
        }
        async fn exists(&self, _cluster: &str) -> Result<bool> {
            Ok(self.exists)
        }
        async fn create(&self, _config: &Config) -> Result<()> {
            self.created.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn destroy(&self, _cluster: &str) -> Result<()> {
            Ok(())
        }
        async fn kubeconfig(&self, _cluster: &str) -> Result<String> {
            bail!("not used")
        }
        async fn external_address(&self, _cluster: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn diagnostics(&self, _cluster: &str) -> String {
            String::new()
        }
    }

    fn config() -> Config {
        Config {
            provider: ProviderKind::K3d,
            cluster_name: "demo".into(),
            size: InstanceSize {
                cpus: 2,
                memory: "4G".into(),
                disk: "20G".into(),
            },
            install_dir: PathBuf::from("/tmp/kubestrap"),
            reset: false,
            k3s_channel: "v1.30".into(),
            disable_network_policy: true,
            load_balancer: None,
            gitops: GitopsConfig {
                repo_url: None,
                branch: "main".into(),
            },
        }
    }

    #[tokio::test]
    async fn existing_instance_skips_creation() {
        let provider = FakeProvider {
            exists: true,
            created: AtomicBool::new(false),
        };
        ensure(&provider, &config()).await.unwrap();
        assert!(!provider.created.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn absent_instance_is_created() {
        let provider = FakeProvider {
            exists: false,
            created: AtomicBool::new(false),
        };
        ensure(&provider, &config()).await.unwrap();
        assert!(provider.created.load(Ordering::SeqCst));
    }
}
