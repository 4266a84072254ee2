//! Kubernetes API access through the materialized kubeconfig, plus the
//! readiness probes the polling steps are built on.

use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};

/// Build a client from the file produced by kubeconfig materialization.
/// Everything after bring-up talks to the cluster through this client.
pub async fn client_for(kubeconfig: &Path) -> Result<Client> {
    let parsed = Kubeconfig::read_from(kubeconfig)
        .with_context(|| format!("invalid kubeconfig at {}", kubeconfig.display()))?;
    let config = kube::Config::from_custom_kubeconfig(parsed, &KubeConfigOptions::default())
        .await
        .context("kubeconfig does not yield a usable client configuration")?;
    Client::try_from(config).context("failed to construct Kubernetes client")
}

/// Whether every node reports `Ready`. An empty node list is not ready.
pub async fn nodes_ready(client: &Client) -> Result<bool> {
    let nodes = Api::<Node>::all(client.clone())
        .list(&ListParams::default())
        .await?;
    Ok(!nodes.items.is_empty() && nodes.items.iter().all(node_is_ready))
}

fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// Whether a deployment exists and has at least one available replica.
pub async fn deployment_ready(client: &Client, namespace: &str, name: &str) -> Result<bool> {
    let deployment = Api::<Deployment>::namespaced(client.clone(), namespace)
        .get_opt(name)
        .await?;
    Ok(deployment
        .and_then(|d| d.status)
        .and_then(|s| s.available_replicas)
        .unwrap_or(0)
        > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};

    fn node(conditions: Vec<NodeCondition>) -> Node {
        Node {
            status: Some(NodeStatus {
                conditions: Some(conditions),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn condition(type_: &str, status: &str) -> NodeCondition {
        NodeCondition {
            type_: type_.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[test]
    fn ready_condition_must_be_true() {
        assert!(node_is_ready(&node(vec![condition("Ready", "True")])));
        assert!(!node_is_ready(&node(vec![condition("Ready", "False")])));
        assert!(!node_is_ready(&node(vec![condition(
            "MemoryPressure",
            "True"
        )])));
        assert!(!node_is_ready(&Node::default()));
    }
}
