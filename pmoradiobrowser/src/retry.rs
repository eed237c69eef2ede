//! Linear-backoff retry for directory queries
//!
//! Each failed attempt `n` (1-based) is followed by a wait of
//! `base_delay * n` before the next one. After `max_retries` extra attempts
//! the last error is returned unchanged.

use std::future::Future;
use std::time::Duration;

/// Default number of extra attempts after the first failure
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default base delay between attempts (milliseconds)
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Retry budget for a single directory query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Run `operation` with the policy, sleeping on the tokio timer between attempts
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_using(policy, operation, tokio::time::sleep).await
}

/// Same as [`with_retry`] with an explicit sleep function
pub async fn with_retry_using<T, E, F, Fut, S, SFut>(
    policy: RetryPolicy,
    mut operation: F,
    mut sleep: S,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Directory query failed, retrying"
                );
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorded_sleep(log: &RefCell<Vec<Duration>>) -> impl FnMut(Duration) -> std::future::Ready<()> + '_ {
        move |d| {
            log.borrow_mut().push(d);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let waits = RefCell::new(Vec::new());
        let calls = RefCell::new(0u32);
        let policy = RetryPolicy::new(2, Duration::from_millis(100));

        let result: Result<&str, String> = with_retry_using(
            policy,
            || {
                *calls.borrow_mut() += 1;
                let n = *calls.borrow();
                async move {
                    if n < 3 {
                        Err(format!("failure {n}"))
                    } else {
                        Ok("stations")
                    }
                }
            },
            recorded_sleep(&waits),
        )
        .await;

        assert_eq!(result, Ok("stations"));
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(
            *waits.borrow(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let waits = RefCell::new(Vec::new());
        let calls = RefCell::new(0u32);

        let result: Result<(), String> = with_retry_using(
            RetryPolicy::new(2, Duration::from_millis(10)),
            || {
                *calls.borrow_mut() += 1;
                let n = *calls.borrow();
                async move { Err(format!("failure {n}")) }
            },
            recorded_sleep(&waits),
        )
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(waits.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_no_wait_on_immediate_success() {
        let waits = RefCell::new(Vec::new());
        let result: Result<u32, String> =
            with_retry_using(RetryPolicy::default(), || async { Ok(7) }, recorded_sleep(&waits)).await;

        assert_eq!(result, Ok(7));
        assert!(waits.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let result: Result<(), &str> = with_retry(RetryPolicy::none(), || async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1500));
    }
}
