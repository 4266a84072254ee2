//! Typed manifest rendering. Resources are built as structured values and
//! serialized once, so a missing field is a compile error rather than a
//! stray substitution in a YAML string.

use anyhow::Result;
use serde_json::{json, Value};

pub const METALLB_NAMESPACE: &str = "metallb-system";

/// The IP range the load-balancer controller may hand out.
pub fn address_pool(name: &str, range: &str) -> Value {
    json!({
        "apiVersion": "metallb.io/v1beta1",
        "kind": "IPAddressPool",
        "metadata": {
            "name": name,
            "namespace": METALLB_NAMESPACE,
        },
        "spec": {
            "addresses": [range],
        },
    })
}

/// Advertises a pool on the local network segment.
pub fn l2_advertisement(name: &str, pool: &str) -> Value {
    json!({
        "apiVersion": "metallb.io/v1beta1",
        "kind": "L2Advertisement",
        "metadata": {
            "name": name,
            "namespace": METALLB_NAMESPACE,
        },
        "spec": {
            "ipAddressPools": [pool],
        },
    })
}

/// The "watch" resource committed to the GitOps repository: the controller
/// reconciles the named path with auto-sync, self-healing and namespace
/// creation enabled.
pub fn gitops_application(repo_url: &str, branch: &str, path: &str) -> Value {
    json!({
        "apiVersion": "argoproj.io/v1alpha1",
        "kind": "Application",
        "metadata": {
            "name": "root",
            "namespace": crate::install::UI_NAMESPACE,
        },
        "spec": {
            "project": "default",
            "source": {
                "repoURL": repo_url,
                "targetRevision": branch,
                "path": path,
            },
            "destination": {
                "server": "https://kubernetes.default.svc",
            },
            "syncPolicy": {
                "automated": {
                    "prune": true,
                    "selfHeal": true,
                },
                "syncOptions": ["CreateNamespace=true"],
            },
        },
    })
}

pub fn to_yaml(manifest: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(manifest)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_references_the_pool_by_name() {
        let pool = address_pool("demo-pool", "198.51.100.0/28");
        let advert = l2_advertisement("demo-l2", "demo-pool");

        assert_eq!(pool["metadata"]["name"], "demo-pool");
        assert_eq!(pool["spec"]["addresses"][0], "198.51.100.0/28");
        assert_eq!(advert["spec"]["ipAddressPools"][0], pool["metadata"]["name"]);
        assert_eq!(pool["metadata"]["namespace"], METALLB_NAMESPACE);
        assert_eq!(advert["metadata"]["namespace"], METALLB_NAMESPACE);
    }

    #[test]
    fn application_watches_the_repository_with_auto_sync() {
        let app = gitops_application(
            "https://example.com/platform-gitops.git",
            "main",
            "infrastructure",
        );
        assert_eq!(
            app["spec"]["source"]["repoURL"],
            "https://example.com/platform-gitops.git"
        );
        assert_eq!(app["spec"]["source"]["targetRevision"], "main");
        assert_eq!(app["spec"]["source"]["path"], "infrastructure");
        assert_eq!(app["spec"]["syncPolicy"]["automated"]["selfHeal"], true);
        assert_eq!(app["spec"]["syncPolicy"]["automated"]["prune"], true);
        assert_eq!(
            app["spec"]["syncPolicy"]["syncOptions"][0],
            "CreateNamespace=true"
        );
    }

    #[test]
    fn manifests_serialize_to_yaml() {
        let yaml = to_yaml(&address_pool("demo-pool", "198.51.100.0/28")).unwrap();
        assert!(yaml.contains("kind: IPAddressPool"));
        assert!(yaml.contains("198.51.100.0/28"));
    }
}
