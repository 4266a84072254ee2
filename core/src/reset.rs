//! Clean reset: destroy any prior instance and delete the persisted state
//! it left behind, so a re-run starts from nothing. Nonexistent resources
//! are success, which is what makes the nuke-and-pave variant idempotent.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::provider::ClusterProvider;

pub async fn clean(provider: &dyn ClusterProvider, config: &Config) -> Result<()> {
    info!("resetting any previous '{}' environment", config.cluster_name);
    provider.destroy(&config.cluster_name).await?;
    remove_file_if_present(&config.kubeconfig_path())?;
    remove_dir_if_present(&config.gitops_dir())?;
    Ok(())
}

fn remove_file_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("cannot remove {}", path.display())),
    }
}

fn remove_dir_if_present(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("cannot remove {}", path.display())),
    }
}
