//! Retry with backoff for transient store errors.
//!
//! [`with_retry`] wraps a fallible database operation and retries on
//! connection-level failures ([`DbError::is_transient`]). Constraint
//! violations, missing rows, and migration errors surface immediately.

use std::future::Future;
use std::time::Duration;

use crate::DbError;

/// Backoff schedule: 500 ms, 1 s, 2 s between the up-to-3 retries.
const BACKOFF_MS: [u64; 3] = [500, 1_000, 2_000];

/// Runs `operation`, retrying transient store errors up to 3 times.
///
/// # Errors
///
/// Returns the last [`DbError`] once the retries are exhausted, or the
/// first non-transient error immediately.
pub async fn with_retry<T, F, Fut>(mut operation: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 0usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= BACKOFF_MS.len() {
                    return Err(err);
                }
                let delay_ms = BACKOFF_MS[attempt];
                attempt += 1;
                tracing::warn!(
                    attempt,
                    delay_ms,
                    error = %err,
                    "store operation failed transiently; backing off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> DbError {
        DbError::Sqlx(sqlx::Error::PoolTimedOut)
    }

    #[tokio::test]
    async fn first_success_needs_no_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = with_retry(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, DbError>(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        tokio::time::pause();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let fut = with_retry(|| {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(transient())
                } else {
                    Ok::<u32, DbError>(99)
                }
            }
        });
        let result = fut.await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = with_retry(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(DbError::NotFound)
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_last_error() {
        tokio::time::pause();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = with_retry(|| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(transient())
            }
        })
        .await;
        // 1 initial attempt + 3 retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(result, Err(DbError::Sqlx(_))));
    }
}
