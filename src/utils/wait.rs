use crate::errors::{ProbeError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Bounds for an explicit wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Satisfied {
        value: T,
        elapsed: Duration,
        attempts: u32,
    },
    TimedOut {
        /// Last value read before the deadline, if any read completed.
        last: Option<T>,
        elapsed: Duration,
        attempts: u32,
    },
}

impl<T> PollOutcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }
}

/// Repeatedly runs `read` until `accept` holds for its value or the policy's
/// timeout elapses.
///
/// `read` always runs at least once. Each read is cut off at the remaining
/// budget so a stalled driver call cannot push the wait past its deadline.
/// Errors from `read` end the wait immediately.
pub async fn poll_until<T, F, Fut, P>(policy: WaitPolicy, mut read: F, accept: P) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        attempts += 1;
        let budget = deadline
            .saturating_duration_since(Instant::now())
            .max(policy.interval);

        match tokio::time::timeout(budget, read()).await {
            Ok(value) => {
                let value = value?;
                if accept(&value) {
                    return Ok(PollOutcome::Satisfied {
                        value,
                        elapsed: start.elapsed(),
                        attempts,
                    });
                }
                last = Some(value);
            }
            Err(_) => debug!("poll attempt {} exceeded its {:?} budget", attempts, budget),
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut {
                last,
                elapsed: start.elapsed(),
                attempts,
            });
        }

        tokio::time::sleep(policy.interval.min(deadline - now)).await;
    }
}

/// Runs a synchronous driver call on tokio's blocking pool.
///
/// A `poll_until` read built on this is abandoned at its budget even if the
/// call never returns.
pub async fn run_blocking<T, F>(call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ProbeError::SessionFailed(format!("driver call did not complete: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn short() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(200), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn returns_as_soon_as_condition_holds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let outcome = poll_until(
            short(),
            move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) },
            |n| *n >= 3,
        )
        .await
        .unwrap();

        match outcome {
            PollOutcome::Satisfied { value, attempts, .. } => {
                assert_eq!(value, 3);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn times_out_with_last_observation() {
        let started = std::time::Instant::now();
        let outcome = poll_until(short(), || async { Ok("old") }, |v| *v == "new")
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        match outcome {
            PollOutcome::TimedOut { last, attempts, elapsed } => {
                assert_eq!(last, Some("old"));
                assert!(attempts > 1);
                assert!(elapsed >= Duration::from_millis(200));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_timeout_still_reads_once() {
        let policy = WaitPolicy::new(Duration::ZERO, Duration::from_millis(10));
        let outcome = poll_until(policy, || async { Ok(true) }, |v| *v).await.unwrap();
        assert!(outcome.is_satisfied());
    }

    #[tokio::test]
    async fn stalled_reads_do_not_outlive_the_deadline() {
        let started = std::time::Instant::now();
        let outcome = poll_until(
            WaitPolicy::new(Duration::from_millis(100), Duration::from_millis(20)),
            || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            },
            |_| true,
        )
        .await
        .unwrap();

        assert!(!outcome.is_satisfied());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn read_errors_end_the_wait() {
        let result: Result<PollOutcome<()>> = poll_until(
            short(),
            || async { Err(ProbeError::SessionFailed("connection closed".into())) },
            |_| true,
        )
        .await;
        let err = assert_err!(result);
        assert!(matches!(err, ProbeError::SessionFailed(_)));
    }

    #[tokio::test]
    async fn blocking_reads_are_cut_off_at_the_deadline() {
        let started = std::time::Instant::now();
        let outcome = poll_until(
            WaitPolicy::new(Duration::from_millis(100), Duration::from_millis(20)),
            || {
                run_blocking(|| {
                    std::thread::sleep(Duration::from_secs(1));
                    Ok(())
                })
            },
            |_| false,
        )
        .await
        .unwrap();

        assert!(!outcome.is_satisfied());
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test]
    async fn blocking_call_results_pass_through() {
        assert_eq!(assert_ok!(run_blocking(|| Ok(7)).await), 7);
        let err = assert_err!(
            run_blocking::<(), _>(|| Err(ProbeError::JavaScriptFailed("boom".into()))).await
        );
        assert!(matches!(err, ProbeError::JavaScriptFailed(_)));
    }
}
