use bon::Builder;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for calls to external services.
#[derive(Builder, Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Total number of attempts. Zero is treated as one: the operation
    /// always runs at least once, so a zero policy never fails without
    /// having called it.
    #[builder(default = 3)]
    pub retries: u32,

    #[builder(default = Duration::from_secs(1))]
    pub base: Duration,

    /// Upper bound (exclusive) of the random delay added to every wait.
    #[builder(default = Duration::from_secs(1))]
    pub max_jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Backoff {
    /// Exponential part of the wait after the zero-based `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt).saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_nanos = u64::try_from(self.max_jitter.as_nanos()).unwrap_or(u64::MAX);
        if max_nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(0..max_nanos))
    }
}

/// Calls `operation` until it succeeds or the policy runs out of attempts,
/// sleeping `base * 2^attempt + jitter` in between. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(backoff: &Backoff, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = backoff.retries.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = backoff.delay(attempt);
                warn!(
                    "Attempt {} of {} failed: {}. Retrying in {:?}",
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant() -> Backoff {
        Backoff::builder()
            .base(Duration::ZERO)
            .max_jitter(Duration::ZERO)
            .build()
    }

    #[test]
    fn test_backoff_defaults() {
        let backoff = Backoff::default();
        assert_eq!(backoff.retries, 3);
        assert_eq!(backoff.base, Duration::from_secs(1));
        assert_eq!(backoff.max_jitter, Duration::from_secs(1));
    }

    #[test]
    fn test_base_delay_doubles() {
        let backoff = Backoff::builder().base(Duration::from_millis(100)).build();
        assert_eq!(backoff.base_delay(0), Duration::from_millis(100));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(200));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_base_delay_saturates() {
        let backoff = Backoff::default();
        assert_eq!(backoff.base_delay(64), Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_jitter_bounds() {
        let backoff = Backoff::builder()
            .base(Duration::from_millis(10))
            .max_jitter(Duration::from_millis(5))
            .build();

        for _ in 0..100 {
            let delay = backoff.delay(0);
            assert!(delay >= Duration::from_millis(10));
            assert!(delay < Duration::from_millis(15));
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<&str, String> = retry_with_backoff(&instant(), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("transient".to_string())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), String> = retry_with_backoff(&instant(), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Err(format!("failure {}", n))
        })
        .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let backoff = Backoff::builder().retries(1).build();

        let result: Result<(), String> = retry_with_backoff(&backoff, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("Test error".to_string())
        })
        .await;

        assert_eq!(result, Err("Test error".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let backoff = Backoff::builder().retries(0).build();

        let result: Result<u32, String> = retry_with_backoff(&backoff, move || async move {
            Ok(counter.fetch_add(1, Ordering::SeqCst))
        })
        .await;

        assert_eq!(result, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
