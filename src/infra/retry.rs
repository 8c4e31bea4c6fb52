//! Bounded exponential retry with a hard deadline, shared by every
//! cross-service RPC client (spec §5 "retries are bounded... and terminate
//! at the use case boundary").

use {crate::domain::error::ServiceError, std::future::Future, std::time::Duration};

/// Races `f` against `deadline`, retrying up to `attempts` times with
/// exponential backoff from a 1 s base (spec §5). The final attempt's error
/// is returned as-is; a deadline overrun surfaces as `ServiceError::Timeout`.
pub async fn with_retry<T, F, Fut>(
    attempts: u32,
    deadline: Duration,
    mut f: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let op = async {
        let mut last_err = None;
        for attempt in 0..attempts {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.expect("attempts is always >= 1"))
    };

    tokio::time::timeout(deadline, op)
        .await
        .unwrap_or_else(|_| Err(ServiceError::Timeout(format!("deadline of {deadline:?} exceeded"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, Duration::from_secs(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ServiceError>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_within_attempts() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, Duration::from_secs(30), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(ServiceError::Provider("transient".into()))
                } else {
                    Ok(99)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_returns_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = with_retry(2, Duration::from_secs(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::Provider("still failing".into())) }
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Provider(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_overrun_surfaces_as_timeout() {
        let result: Result<i32, _> = with_retry(5, Duration::from_millis(500), || async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err(ServiceError::Provider("slow".into()))
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Timeout(_))));
    }
}
