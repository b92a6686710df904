// src/core/retry.rs

use color_eyre::eyre::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Invokes `attempt` until it succeeds or `max_retries` additional attempts
/// are exhausted, sleeping `2^attempt * 0.5s` between attempts.
///
/// Retry is transparent to the caller: a module that fails twice and then
/// succeeds yields exactly the result of the successful attempt. On final
/// failure the last error is returned for the caller to convert into a
/// synthesized failure result.
///
/// # Arguments
/// * `attempt` - Factory producing a fresh future per attempt.
/// * `max_retries` - Number of retries after the initial attempt.
/// * `name` - Module name, for logging only.
pub async fn with_retry<T, F, Fut>(mut attempt: F, max_retries: u32, name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt_no: u32 = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt_no < max_retries => {
                // 0.5s, 1s, 2s, 4s...
                let wait = Duration::from_secs_f64(f64::powi(2.0, attempt_no as i32) * 0.5);
                warn!(
                    module = name,
                    attempt = attempt_no + 1,
                    total = max_retries + 1,
                    wait_secs = wait.as_secs_f64(),
                    error = %e,
                    "Check attempt failed, retrying."
                );
                tokio::time::sleep(wait).await;
                attempt_no += 1;
            }
            Err(e) => {
                error!(
                    module = name,
                    attempts = max_retries + 1,
                    error = %e,
                    "Check failed after all attempts."
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::eyre;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                }
            },
            3,
            "test",
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_is_transparent_after_two_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(eyre!("transient fault {n}"))
                    } else {
                        Ok("stable value".to_string())
                    }
                }
            },
            3,
            "test",
        )
        .await;
        // Same value as an immediate success: the retries left no trace.
        assert_eq!(result.unwrap(), "stable value");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<u32> = with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Err(eyre!("fault {n}"))
                }
            },
            2,
            "test",
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("fault 2"));
        // Initial attempt + two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
