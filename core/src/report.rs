//! Final report: access URL (or a pending instruction), the generated
//! admin credentials, and the kubeconfig location. Credential retrieval is
//! best-effort; the environment is functional without it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::exec;
use crate::install::{ADMIN_SECRET, UI_NAMESPACE, UI_SERVICE};

pub struct Report {
    pub ui_address: Option<String>,
    pub admin_password: Option<SecretString>,
    pub kubeconfig: PathBuf,
}

impl Report {
    /// Printed exactly once, at the end of a successful run.
    pub fn print(&self) {
        println!();
        println!("Environment ready.");
        match &self.ui_address {
            Some(address) => println!("  UI:         https://{address}"),
            None => println!(
                "  UI:         pending -- run 'kubectl -n {UI_NAMESPACE} get svc {UI_SERVICE}' later"
            ),
        }
        match &self.admin_password {
            Some(password) => {
                println!("  admin user: admin");
                println!("  password:   {}", password.expose_secret());
            }
            None => println!("  password:   not available yet, see the log for details"),
        }
        println!("  kubeconfig: {}", self.kubeconfig.display());
    }
}

/// Fetch and decode the generated admin secret. A missing secret is a
/// warning, not an error.
pub async fn admin_password(kubeconfig: &Path) -> Option<SecretString> {
    let kubeconfig = kubeconfig.to_string_lossy();
    let encoded = match exec::run_ok(
        "kubectl",
        &[
            "--kubeconfig",
            &kubeconfig,
            "-n",
            UI_NAMESPACE,
            "get",
            "secret",
            ADMIN_SECRET,
            "-o",
            "jsonpath={.data.password}",
        ],
    )
    .await
    {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("admin secret '{ADMIN_SECRET}' not readable yet: {e:#}");
            return None;
        }
    };

    match decode_password(encoded.trim()) {
        Ok(password) => Some(password),
        Err(e) => {
            warn!("admin secret '{ADMIN_SECRET}' could not be decoded: {e:#}");
            None
        }
    }
}

fn decode_password(encoded: &str) -> Result<SecretString> {
    let bytes = STANDARD
        .decode(encoded)
        .context("secret payload is not base64")?;
    let text = String::from_utf8(bytes).context("secret payload is not UTF-8")?;
    Ok(SecretString::new(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_payload_is_decoded() {
        let password = decode_password("aHVudGVyMg==").unwrap();
        assert_eq!(password.expose_secret(), "hunter2");
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(decode_password("not base64!!").is_err());
    }
}
