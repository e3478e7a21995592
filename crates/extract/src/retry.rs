use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Exponential backoff for transport-level failures of a single
/// collaborator request. Malformed replies are never retried here; the
/// workflow decides what to do with them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Delay before retry number `retry` (1-based), doubling up to the cap.
    pub fn backoff_for(&self, retry: usize) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1) as u32);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `f` until it succeeds, the error is not transient, or retries run out.
    pub async fn retry_if<F, Fut, T, E, P>(&self, operation: &str, mut f: F, transient: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut retry = 0;
        loop {
            let err = match f().await {
                Ok(value) => {
                    if retry > 0 {
                        debug!(operation, retries = retry, "Recovered after retrying");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if retry >= self.max_retries || !transient(&err) {
                warn!(operation, retries = retry, error = %err, "Giving up");
                return Err(err);
            }

            retry += 1;
            let delay = self.backoff_for(retry);
            warn!(
                operation,
                retry,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient failure, backing off"
            );
            sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, 500, 5000)
    }
}

/// Connection failures, timeouts, 429 and 5xx responses are worth retrying.
/// Anything else (bad request, undecodable body) will fail the same way again.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(|e| {
            e.is_connect()
                || e.is_timeout()
                || e.status()
                    .is_some_and(|s| s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS)
        })
}
