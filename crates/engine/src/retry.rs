//! Retrying request executor with exponential backoff and jitter
//!
//! Wraps one outbound call. Retryable failures (network, 5xx, remote
//! throttling) back off exponentially up to the attempt cap; fatal failures
//! return immediately. A remote "slow down" gets an extended wait here and
//! is surfaced in the outcome so the caller can feed it back into the
//! platform's rate limiter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::errors::FetchError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Extra wait applied when the remote explicitly signalled a rate limit.
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(30),
            rate_limit_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (1-based): exponential,
    /// capped, widened after a throttling signal, with 50-100% jitter.
    fn backoff(&self, attempt: u32, rate_limited: bool) -> Duration {
        let shift = (attempt - 1).min(16);
        let mut delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        if rate_limited {
            delay += self.rate_limit_delay;
        }
        delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
    }
}

/// Result of a retried operation, with enough structure for the caller to
/// feed rate-limit hits back into the platform's limiter.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, FetchError>,
    pub attempts: u32,
    /// How many attempts failed with an explicit remote throttling signal.
    pub rate_limit_hits: u32,
}

/// Execute `op` with retries per `policy`. Never propagates past the
/// caller: after exhausting retries the last classified failure is
/// returned. Backoff sleeps are abandoned promptly on cancellation.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut rate_limit_hits = 0u32;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome { result: Err(FetchError::Cancelled), attempts: attempt, rate_limit_hits };
        }
        attempt += 1;

        match op().await {
            Ok(value) => {
                return RetryOutcome { result: Ok(value), attempts: attempt, rate_limit_hits };
            }
            Err(err) => {
                let rate_limited = matches!(err, FetchError::RateLimited);
                if rate_limited {
                    rate_limit_hits += 1;
                }
                if !err.is_retryable() || attempt >= policy.max_attempts {
                    return RetryOutcome { result: Err(err), attempts: attempt, rate_limit_hits };
                }

                let delay = policy.backoff(attempt, rate_limited);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying after failure");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return RetryOutcome { result: Err(FetchError::Cancelled), attempts: attempt, rate_limit_hits };
                    }
                }
            }
        }
    }
}
