//! Service exposure: switch the GitOps UI service to `LoadBalancer` and
//! poll for an assigned external address. Exhausting the attempt budget is
//! the one non-fatal wait in the procedure -- the environment works even
//! if the UI address is still pending.

use std::time::Duration;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Service;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::{info, warn};

use crate::install::{UI_NAMESPACE, UI_SERVICE};
use crate::retry::{self, PollBudget};

const ADDRESS_BUDGET: PollBudget = PollBudget::new(30, Duration::from_secs(10));

pub async fn expose_ui(client: &Client) -> Result<Option<String>> {
    let services = Api::<Service>::namespaced(client.clone(), UI_NAMESPACE);
    services
        .patch(
            UI_SERVICE,
            &PatchParams::default(),
            &Patch::Merge(&json!({"spec": {"type": "LoadBalancer"}})),
        )
        .await
        .with_context(|| format!("failed to patch service '{UI_SERVICE}' to LoadBalancer"))?;

    let address = retry::poll("an external address", ADDRESS_BUDGET, || async {
        let service = services.get(UI_SERVICE).await?;
        Ok(external_address(&service))
    })
    .await?;

    match &address {
        Some(address) => info!("UI reachable at https://{address}"),
        None => warn!(
            "no external address assigned yet; query it later with \
             'kubectl -n {UI_NAMESPACE} get svc {UI_SERVICE}'"
        ),
    }
    Ok(address)
}

fn external_address(service: &Service) -> Option<String> {
    service
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .iter()
        .find_map(|ingress| ingress.ip.clone().or_else(|| ingress.hostname.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, ServiceStatus};

    fn service_with(ingress: Option<Vec<LoadBalancerIngress>>) -> Service {
        Service {
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus { ingress }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn ip_is_preferred_and_hostname_is_a_fallback() {
        let with_ip = service_with(Some(vec![LoadBalancerIngress {
            ip: Some("198.51.100.2".into()),
            hostname: Some("lb.example".into()),
            ..Default::default()
        }]));
        assert_eq!(external_address(&with_ip).as_deref(), Some("198.51.100.2"));

        let hostname_only = service_with(Some(vec![LoadBalancerIngress {
            hostname: Some("lb.example".into()),
            ..Default::default()
        }]));
        assert_eq!(external_address(&hostname_only).as_deref(), Some("lb.example"));
    }

    #[test]
    fn pending_service_has_no_address() {
        assert_eq!(external_address(&service_with(None)), None);
        assert_eq!(external_address(&service_with(Some(vec![]))), None);
        assert_eq!(external_address(&Service::default()), None);
    }
}
