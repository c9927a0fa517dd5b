use std::future::Future;
use std::time::Duration;

use crate::error::CatalogError;

/// Caller-side retry for whole catalog walks. Only transport failures are
/// retried; the backoff grows linearly with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: Self = Self {
        max_attempts: 1,
        base_backoff: Duration::ZERO,
    };

    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    pub async fn run<T, Op, Fut>(&self, mut op: Op) -> Result<T, CatalogError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let backoff = self.base_backoff.saturating_mul(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying catalog walk"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::{TransportError, UpstreamError};

    #[tokio::test]
    async fn transport_errors_are_retried_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let value = policy
            .run(|| async {
                let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                if n < 3 {
                    Err(CatalogError::Transport(TransportError::Timeout))
                } else {
                    Ok(n)
                }
            })
            .await
            .expect("third attempt should succeed");

        assert_eq!(value, 3);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let err = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::Relaxed);
                Err::<(), _>(CatalogError::Transport(TransportError::Timeout))
            })
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn upstream_and_inconsistent_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let err = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::Relaxed);
                Err::<(), _>(CatalogError::Upstream(UpstreamError::BadStatus(500)))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Upstream(_)));
        assert_eq!(attempts.load(Ordering::Relaxed), 1);

        let err = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::Relaxed);
                Err::<(), _>(CatalogError::InconsistentTotal {
                    expected: 1,
                    found: 2,
                    offset: 50,
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InconsistentTotal { .. }));
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
