//! Helpers for invoking the external tools the bootstrap drives
//! (multipass/k3d, kubectl, helm, git, the platform package manager).
//!
//! Every operation is a blocking child process; there is no concurrency
//! beyond awaiting one command at a time.

use std::process::{Output, Stdio};

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Run a command and capture its output without judging the exit status.
pub async fn run(program: &str, args: &[&str]) -> Result<Output> {
    debug!("exec: {} {}", program, args.join(" "));
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("failed to spawn '{program}'"))
}

/// Run a command that must succeed; returns captured stdout.
pub async fn run_ok(program: &str, args: &[&str]) -> Result<String> {
    let output = run(program, args).await?;
    if !output.status.success() {
        bail!(
            "'{} {}' exited with {}: {}",
            program,
            args.join(" "),
            output.status,
            failure_detail(&output),
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command and only report whether it succeeded. Used for existence
/// probes where a non-zero exit is an answer, not an error.
pub async fn run_status(program: &str, args: &[&str]) -> Result<bool> {
    Ok(run(program, args).await?.status.success())
}

/// Run a command with the given bytes piped to stdin (e.g. `kubectl apply
/// -f -` with a rendered manifest).
pub async fn run_with_stdin(program: &str, args: &[&str], input: &str) -> Result<String> {
    debug!("exec (stdin): {} {}", program, args.join(" "));
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn '{program}'"))?;

    let mut stdin = child.stdin.take().context("child stdin unavailable")?;
    stdin.write_all(input.as_bytes()).await?;
    drop(stdin);

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("failed to wait for '{program}'"))?;
    if !output.status.success() {
        bail!(
            "'{} {}' exited with {}: {}",
            program,
            args.join(" "),
            output.status,
            failure_detail(&output),
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether a command is resolvable at all. Spawning is the portable probe;
/// a `NotFound` spawn error means the tool is absent from PATH.
pub async fn have(program: &str) -> bool {
    match Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(_) => true,
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    }
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    if detail.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        detail.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let out = run_ok("sh", &["-c", "echo hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error_with_stderr() {
        let err = run_ok("sh", &["-c", "echo broken >&2; exit 3"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn status_probe_does_not_error() {
        assert!(!run_status("sh", &["-c", "exit 1"]).await.unwrap());
        assert!(run_status("sh", &["-c", "exit 0"]).await.unwrap());
    }

    #[tokio::test]
    async fn stdin_is_piped() {
        let out = run_with_stdin("cat", &[], "piped input").await.unwrap();
        assert_eq!(out, "piped input");
    }

    #[tokio::test]
    async fn missing_tool_is_reported_absent() {
        assert!(!have("kubestrap-no-such-tool").await);
        assert!(have("sh").await);
    }
}
