//! Capability seam over the cluster backends.
//!
//! The bootstrap procedure is one canonical sequence; what differs between
//! target environments is how an instance running k3s is provisioned, how
//! its credentials are obtained, and whether it has an address reachable
//! from the host. Each backend answers those questions behind
//! [`ClusterProvider`].

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{Config, ProviderKind};

mod k3d;
mod multipass;

pub use k3d::K3dProvider;
pub use multipass::MultipassProvider;

#[async_trait]
pub trait ClusterProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// The host CLI this backend drives; checked during preflight.
    fn tool(&self) -> &'static str;

    async fn exists(&self, cluster: &str) -> Result<bool>;

    /// Create the instance and install k3s in it. Must only be called when
    /// [`exists`](Self::exists) reported false.
    async fn create(&self, config: &Config) -> Result<()>;

    /// Tear the instance down. A nonexistent instance is success.
    async fn destroy(&self, cluster: &str) -> Result<()>;

    /// The kubeconfig generated inside the instance, verbatim.
    async fn kubeconfig(&self, cluster: &str) -> Result<String>;

    /// Externally reachable address to substitute for loopback in the
    /// kubeconfig. `None` means host-local access already works.
    async fn external_address(&self, cluster: &str) -> Result<Option<String>>;

    /// Recent instance logs, surfaced when readiness times out.
    async fn diagnostics(&self, cluster: &str) -> String;
}

pub fn for_kind(kind: ProviderKind) -> Box<dyn ClusterProvider> {
    match kind {
        ProviderKind::Multipass => Box::new(MultipassProvider),
        ProviderKind::K3d => Box::new(K3dProvider),
    }
}
