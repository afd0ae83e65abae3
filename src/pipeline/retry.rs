//! Retry with exponential backoff for remote calls.
//!
//! Every vendor call in the pipeline goes through [`with_retry`]. The wait
//! before attempt `n` (1-based) is `backoff_ms * 2^(n-1)`; with the default
//! 500 ms and 3 retries that is 500 ms → 1 s → 2 s. A `Retry-After` sent with
//! a 429 replaces the computed delay. Errors that a retry cannot fix
//! (bad request, rejected credentials, undecodable response) end the loop.

use crate::error::ServiceError;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Longest single wait, whatever the attempt number or server hint.
const MAX_DELAY_MS: u64 = 60_000;

/// Result of a retried operation and how many retries it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, ServiceError>,
    pub retries: u32,
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(backoff_ms: u64, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let ms = match retry_after_secs {
        Some(secs) => secs.saturating_mul(1000),
        None => backoff_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16)),
    };
    Duration::from_millis(ms.min(MAX_DELAY_MS))
}

/// Run `op` until it succeeds, fails permanently, or `max_retries` retries are spent.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    max_retries: u32,
    backoff_ms: u64,
    mut op: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    retries: attempt,
                }
            }
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay = backoff_delay(backoff_ms, attempt, e.retry_after_secs());
                warn!(
                    "{}: {}; retry {}/{} after {}ms",
                    label,
                    e,
                    attempt,
                    max_retries,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            Err(e) => {
                return Attempted {
                    result: Err(e),
                    retries: attempt,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> ServiceError {
        ServiceError::Http {
            service: "test".into(),
            status: 503,
            body: "busy".into(),
        }
    }

    #[test]
    fn delay_doubles_and_honours_retry_after() {
        assert_eq!(backoff_delay(500, 1, None), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 2, None), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 3, None), Duration::from_millis(2000));
        assert_eq!(backoff_delay(500, 1, Some(3)), Duration::from_secs(3));
        assert_eq!(backoff_delay(500, 40, None), Duration::from_millis(MAX_DELAY_MS));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let out = with_retry("test", 3, 1, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(server_error())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(out.result.unwrap(), 2);
        assert_eq!(out.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let out: Attempted<()> = with_retry("test", 2, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        })
        .await;
        assert!(out.result.is_err());
        assert_eq!(out.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Attempted<()> = with_retry("test", 5, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ServiceError::Auth {
                    service: "test".into(),
                    detail: "invalid key".into(),
                })
            }
        })
        .await;
        assert!(matches!(out.result, Err(ServiceError::Auth { .. })));
        assert_eq!(out.retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
