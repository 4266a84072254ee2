//! Bounded fixed-interval polling.
//!
//! Every wait in the bootstrap has the same shape: probe, sleep a fixed
//! interval, give up after a fixed number of attempts. The probe decides
//! "what to wait for"; this module owns "how to wait". A probe returning an
//! error is an outright failure and is never retried -- only "not ready
//! yet" (`Ok(None)`) consumes the attempt budget.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::debug;

#[derive(Clone, Copy, Debug)]
pub struct PollBudget {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollBudget {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Poll until the probe yields a value or the budget is exhausted.
/// Exhaustion is `Ok(None)`; callers decide whether that is fatal.
pub async fn poll<T, F, Fut>(what: &str, budget: PollBudget, mut probe: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=budget.attempts {
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        debug!(
            "waiting for {what} (attempt {attempt}/{})",
            budget.attempts
        );
        if attempt < budget.attempts {
            tokio::time::sleep(budget.interval).await;
        }
    }
    Ok(None)
}

/// Like [`poll`], but budget exhaustion is an error.
pub async fn wait_for<T, F, Fut>(what: &str, budget: PollBudget, probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    poll(what, budget, probe).await?.ok_or_else(|| {
        anyhow!(
            "timed out waiting for {what} ({} attempts, {:?} apart)",
            budget.attempts,
            budget.interval
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: PollBudget = PollBudget::new(3, Duration::from_millis(1));

    #[tokio::test]
    async fn returns_once_ready() {
        let calls = AtomicU32::new(0);
        let value = wait_for("thing", FAST, || async {
            if calls.fetch_add(1, Ordering::SeqCst) >= 1 {
                Ok(Some(7))
            } else {
                Ok(None)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhaustion_is_an_error_for_wait_for() {
        let err = wait_for("thing", FAST, || async { Ok(None::<()>) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out waiting for thing"));
    }

    #[tokio::test]
    async fn exhaustion_is_none_for_poll() {
        let outcome = poll("thing", FAST, || async { Ok(None::<()>) })
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn probe_failure_is_never_retried() {
        let calls = AtomicU32::new(0);
        let err = wait_for("thing", FAST, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            bail!("command failed outright");
            #[allow(unreachable_code)]
            Ok(None::<()>)
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("command failed outright"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
