//! # Bounded polling
//!
//! Readiness of a virtual cluster is only observable by asking again. Every
//! wait in the provisioning flow is a fixed-interval poll with a wall-clock
//! deadline set when the loop is entered.
//!
//! Sequence for a 10s interval and 30s timeout: attempts at 0s, 10s, 20s
//! and 30s, then `Timeout`. The final sleep is shortened so the last attempt
//! lands on the deadline.
//!
//! Polls never kill an attempt in flight; the deadline is only checked
//! between attempts. A cancelled token ends the loop at the next check.

use crate::error::ProvisionError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Interval and deadline of one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// A single attempt, no waiting.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

/// Run `attempt` until it yields a value, the deadline passes, or `cancel`
/// fires.
///
/// `attempt` receives the 1-based attempt number and returns `None` for
/// "not yet".
///
/// # Errors
/// * [`ProvisionError::Timeout`] - deadline reached without a value
/// * [`ProvisionError::Cancelled`] - `cancel` fired
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    what: &str,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, ProvisionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut n = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled(what.to_string()));
        }

        n += 1;
        if let Some(value) = attempt(n).await {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ProvisionError::Timeout {
                what: what.to_string(),
                after: policy.timeout,
            });
        }

        let wait = policy.interval.min(deadline - now);
        debug!(what = %what, attempt = n, wait_ms = wait.as_millis(), "not ready yet, retrying");
        tokio::select! {
            () = cancel.cancelled() => {
                return Err(ProvisionError::Cancelled(what.to_string()));
            }
            () = tokio::time::sleep(wait) => {}
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first.
pub async fn pause(delay: Duration, what: &str, cancel: &CancellationToken) -> Result<(), ProvisionError> {
    tokio::select! {
        () = cancel.cancelled() => Err(ProvisionError::Cancelled(what.to_string())),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(5), Duration::from_millis(40))
    }

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let value = poll_until(&fast(), "thing", &CancellationToken::new(), |_| async { Some(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let value = poll_until(&fast(), "thing", &CancellationToken::new(), |n| async move {
            (n == 3).then_some(n)
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_times_out_with_no_partial_result() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let err = poll_until(&fast(), "ingress", &CancellationToken::new(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { None::<()> }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ProvisionError::Timeout { ref what, .. } if what == "ingress"));
        // 0ms .. 40ms every 5ms, last attempt on the deadline
        let n = attempts.load(Ordering::SeqCst);
        assert!(n >= 2, "expected several attempts, got {n}");
    }

    #[tokio::test]
    async fn test_once_makes_exactly_one_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let result = poll_until(&PollPolicy::once(), "x", &CancellationToken::new(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { None::<()> }
        })
        .await;
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_polling() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = poll_until(&fast(), "secret", &cancel, |_| async { Some(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let slow = PollPolicy::new(Duration::from_secs(60), Duration::from_secs(600));
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let err = poll_until(&slow, "connect", &cancel, |_| async { None::<()> })
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_pause_is_cancellable() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(pause(Duration::from_secs(60), "readiness delay", &cancel).await.is_err());
        assert!(pause(Duration::ZERO, "readiness delay", &CancellationToken::new()).await.is_ok());
    }
}
