use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::SocError;

/// Exponential backoff with jitter (spec §7: base 1s, factor 2, cap 30s,
/// max 3 attempts). Only retries errors `SocError::retryable()` marks as
/// transient; the final attempt's error is always returned on exhaustion.
pub async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u8,
    base_delay: Duration,
    cap: Duration,
    mut f: F,
) -> Result<T, SocError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SocError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && e.retryable() => {
                let exp = base_delay.saturating_mul(1 << (attempt - 1).min(16));
                let delay = exp.min(cap);
                let jitter_ms = rand::thread_rng().gen_range(0..=(delay.as_millis() as u64 / 4).max(1));
                tokio::time::sleep(delay + Duration::from_millis(jitter_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = retry_with_backoff(3, Duration::from_millis(1), Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(SocError::transient("not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_surfaces_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> =
            retry_with_backoff(3, Duration::from_millis(1), Duration::from_millis(10), move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(SocError::transient("still failing"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> =
            retry_with_backoff(3, Duration::from_millis(1), Duration::from_millis(10), move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(SocError::validation("bad input"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
