//! Retry policy for upstream requests.
//!
//! Only genuinely transient failures are retried here: network-level
//! errors and 5xx responses. A 429 is deliberately *not* retried inside
//! the client — the dispatch loop owns rate-limit back-off, because it
//! must also reschedule the affected row and stop the batch.

use std::future::Future;
use std::time::Duration;

use crate::error::UpstreamError;

const MAX_DELAY_MS: u64 = 60_000;

/// Whether a failed attempt is worth repeating after a delay.
///
/// Timeouts, connection failures, and server-side 5xx responses pass;
/// auth problems, missing media, rate limits, and malformed bodies are
/// final — repeating the call changes nothing, or steps on a back-off
/// the caller owns.
pub(crate) fn is_retriable(err: &UpstreamError) -> bool {
    match err {
        UpstreamError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        UpstreamError::UnexpectedStatus { status, .. } => (500..600).contains(status),
        UpstreamError::Auth(_)
        | UpstreamError::NotFound { .. }
        | UpstreamError::RateLimited { .. }
        | UpstreamError::Deserialize { .. }
        | UpstreamError::SessionFile { .. } => false,
    }
}

/// Sleep before the n-th retry (1-based): the base doubled per attempt,
/// capped at 60 s, spread by up to a quarter either side so a burst of
/// workers does not reconverge on the same instant.
fn backoff_delay_ms(attempt: u32, base_ms: u64) -> u64 {
    let doubled = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1).min(16)));
    let nominal = doubled.min(MAX_DELAY_MS);
    let spread = nominal / 4;
    if spread == 0 {
        return nominal;
    }
    nominal - spread + rand::random::<u64>() % (2 * spread + 1)
}

/// Runs `operation`, repeating it on transient errors up to
/// `max_retries` further attempts with [`backoff_delay_ms`] sleeps in
/// between. The first non-transient error, or the last error once the
/// attempts run out, is handed back unchanged.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(attempt, backoff_base_ms);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "upstream call failed transiently; sleeping before next attempt"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deserialize_err() -> UpstreamError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        UpstreamError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    #[test]
    fn auth_is_not_retriable() {
        assert!(!is_retriable(&UpstreamError::Auth("expired".to_owned())));
    }

    #[test]
    fn rate_limited_is_not_retriable() {
        assert!(!is_retriable(&UpstreamError::RateLimited {
            retry_after_secs: 300
        }));
    }

    #[test]
    fn not_found_is_not_retriable() {
        assert!(!is_retriable(&UpstreamError::NotFound {
            context: "media 1".to_owned()
        }));
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        assert!(!is_retriable(&deserialize_err()));
    }

    #[test]
    fn server_error_status_is_retriable() {
        assert!(is_retriable(&UpstreamError::UnexpectedStatus {
            status: 503,
            context: "feed".to_owned()
        }));
    }

    #[test]
    fn client_error_status_is_not_retriable() {
        assert!(!is_retriable(&UpstreamError::UnexpectedStatus {
            status: 418,
            context: "feed".to_owned()
        }));
    }

    #[test]
    fn backoff_delay_doubles_within_its_spread() {
        for _ in 0..20 {
            let first = backoff_delay_ms(1, 1_000);
            assert!((750..=1_250).contains(&first), "attempt 1 gave {first}ms");
            let third = backoff_delay_ms(3, 1_000);
            assert!((3_000..=5_000).contains(&third), "attempt 3 gave {third}ms");
        }
    }

    #[test]
    fn backoff_delay_is_capped() {
        for _ in 0..20 {
            let delay = backoff_delay_ms(30, 1_000);
            assert!(delay <= 75_000, "capped delay plus spread, got {delay}ms");
        }
    }

    #[test]
    fn backoff_delay_with_zero_base_stays_zero() {
        assert_eq!(backoff_delay_ms(1, 0), 0);
    }

    #[tokio::test]
    async fn does_not_retry_rate_limited() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(UpstreamError::RateLimited {
                    retry_after_secs: 60,
                })
            }
        })
        .await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "RateLimited must not be retried here — the caller owns that back-off"
        );
        assert!(matches!(result, Err(UpstreamError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(UpstreamError::UnexpectedStatus {
                        status: 502,
                        context: "feed".to_owned(),
                    })
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
