//! GitOps repository sync: keep a local working copy with the canonical
//! layout the installed controllers expect.
//!
//! Existing clone: fetch and fast-forward (divergence is a warning, the
//! operator may have edited upstream on purpose). No clone yet: try to
//! clone, fall back to a fresh `git init` with the remote registered when
//! the remote is unreachable. Placeholders are created only when absent so
//! operator edits are never clobbered; an empty diff is not an error.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::exec;
use crate::manifests;

/// Top-level directories the consuming controllers expect, bit-exact.
pub const LAYOUT: &[&str] = &[
    "docs",
    "infrastructure",
    "tenants",
    "addons",
    "demos",
    "scripts",
];

const PLACEHOLDERS: &[(&str, &str)] = &[
    (
        "docs/README.md",
        "# Environment documentation\n\nNotes about this demo environment live here.\n",
    ),
    (
        "infrastructure/README.md",
        "# Infrastructure\n\nManifests for cluster-level infrastructure, reconciled automatically.\n",
    ),
    (
        "tenants/README.md",
        "# Tenant clusters\n\nVirtual tenant cluster definitions.\n",
    ),
    (
        "addons/README.md",
        "# Add-ons\n\nShared add-ons distributed across clusters.\n",
    ),
    (
        "demos/README.md",
        "# Demos\n\nPer-product demo manifests.\n",
    ),
    (
        "scripts/README.md",
        "# Scripts\n\nHelper scripts for this environment.\n",
    ),
];

const WATCH_MANIFEST: &str = "infrastructure/root-application.yaml";

pub async fn sync(config: &Config) -> Result<()> {
    let dir = config.gitops_dir();
    let branch = &config.gitops.branch;

    let has_remote = if dir.join(".git").exists() {
        fast_forward(&dir, branch).await
    } else if let Some(url) = &config.gitops.repo_url {
        clone_or_init(&dir, url, branch).await?
    } else {
        init(&dir, branch, None).await?;
        false
    };

    ensure_layout(&dir)?;
    if let Some(url) = &config.gitops.repo_url {
        let app = manifests::gitops_application(url, branch, "infrastructure");
        write_if_absent(&dir.join(WATCH_MANIFEST), &manifests::to_yaml(&app)?)?;
    }

    commit_if_dirty(&dir).await?;

    if has_remote {
        push(&dir, branch, config).await?;
    } else if config.gitops.repo_url.is_some() {
        warn!("remote was unreachable; commit kept local, push once credentials are set up");
    }
    Ok(())
}

async fn fast_forward(dir: &Path, branch: &str) -> bool {
    let dir_arg = dir.to_string_lossy();
    let fetched = exec::run_ok("git", &["-C", &dir_arg, "fetch", "origin"]).await;
    if let Err(e) = fetched {
        warn!("git fetch failed, leaving working copy as-is: {e:#}");
        return false;
    }
    let merge = exec::run_ok(
        "git",
        &[
            "-C",
            &dir_arg,
            "merge",
            "--ff-only",
            &format!("origin/{branch}"),
        ],
    )
    .await;
    if let Err(e) = merge {
        // Diverged history; the operator may have rewritten upstream.
        warn!("fast-forward of '{branch}' failed, keeping local state: {e:#}");
    }
    true
}

/// Returns whether a reachable remote backs the working copy.
async fn clone_or_init(dir: &Path, url: &str, branch: &str) -> Result<bool> {
    let dir_arg = dir.to_string_lossy();
    match exec::run_ok(
        "git",
        &["clone", "--branch", branch, url, &dir_arg],
    )
    .await
    {
        Ok(_) => {
            info!("cloned {url}");
            Ok(true)
        }
        Err(e) => {
            warn!("clone of {url} failed ({e:#}); initializing a fresh repository instead");
            init(dir, branch, Some(url)).await?;
            Ok(false)
        }
    }
}

async fn init(dir: &Path, branch: &str, remote: Option<&str>) -> Result<()> {
    fs::create_dir_all(dir)?;
    let dir_arg = dir.to_string_lossy();
    exec::run_ok("git", &["-C", &dir_arg, "init", "-b", branch])
        .await
        .context("git init failed")?;
    if let Some(url) = remote {
        exec::run_ok("git", &["-C", &dir_arg, "remote", "add", "origin", url])
            .await
            .context("registering the git remote failed")?;
    }
    Ok(())
}

/// Create the canonical directories and any missing placeholder files.
/// Existing files are never touched.
pub fn ensure_layout(dir: &Path) -> Result<bool> {
    let mut changed = false;
    for sub in LAYOUT {
        let path = dir.join(sub);
        if !path.exists() {
            fs::create_dir_all(&path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            changed = true;
        }
    }
    for (rel, content) in PLACEHOLDERS {
        changed |= write_if_absent(&dir.join(rel), content)?;
    }
    Ok(changed)
}

fn write_if_absent(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(true)
}

async fn commit_if_dirty(dir: &Path) -> Result<()> {
    let dir_arg = dir.to_string_lossy();
    let status = exec::run_ok("git", &["-C", &dir_arg, "status", "--porcelain"])
        .await
        .context("git status failed")?;
    if status.trim().is_empty() {
        info!("gitops working copy already up to date");
        return Ok(());
    }
    exec::run_ok("git", &["-C", &dir_arg, "add", "-A"]).await?;
    // Identity fallbacks keep the commit working on hosts without a global
    // git config.
    exec::run_ok(
        "git",
        &[
            "-C",
            &dir_arg,
            "-c",
            "user.name=kubestrap",
            "-c",
            "user.email=kubestrap@localhost",
            "commit",
            "-m",
            "Ensure bootstrap repository layout",
        ],
    )
    .await
    .context("git commit failed")?;
    Ok(())
}

async fn push(dir: &Path, branch: &str, config: &Config) -> Result<()> {
    let dir_arg = dir.to_string_lossy();
    exec::run_ok("git", &["-C", &dir_arg, "push", "-u", "origin", branch])
        .await
        .with_context(|| {
            format!(
                "git push rejected; set up credentials for {} and push manually",
                config.gitops.repo_url.as_deref().unwrap_or("the remote")
            )
        })?;
    Ok(())
}
