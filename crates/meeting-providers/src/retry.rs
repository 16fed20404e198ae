use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{ProviderError, Result};

/// Backoff shape for [`with_retry`], normally sourced from a
/// `meeting_core::RoundTableConfig` so a host application can tune attempts
/// and delays without a code change.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: meeting_core::limits::RETRY_MAX_ATTEMPTS,
            base_delay_ms: meeting_core::limits::RETRY_BASE_DELAY_MS,
            cap_ms: meeting_core::limits::RETRY_CAP_MS,
        }
    }
}

impl From<&meeting_core::RoundTableConfig> for RetryPolicy {
    fn from(config: &meeting_core::RoundTableConfig) -> Self {
        Self { max_attempts: config.retry_max_attempts, base_delay_ms: config.retry_base_delay_ms, cap_ms: config.retry_cap_ms }
    }
}

/// Retry policy: up to 3 attempts by default, exponential backoff base
/// 500ms cap 8s, full jitter (delay sampled uniformly from
/// `[0, computed_delay]` rather than a fixed `±10%` band). Non-retryable
/// errors (`AuthError`, `ProviderError` 4xx except 429) return immediately.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = backoff_delay(&policy, attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying provider call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Full-jitter exponential backoff: `base * 2^attempt`, capped, then a
/// uniform random draw in `[0, capped]`.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let computed = policy.base_delay_ms.saturating_mul(1u64 << attempt.min(16)).min(policy.cap_ms);
    let jittered = if computed == 0 {
        0
    } else {
        rand::rng().random_range(0..=computed)
    };
    Duration::from_millis(jittered)
}

/// Wrap a future with the provider-specific deadline, mapping an elapsed
/// deadline onto `ProviderError::NetworkError` so it re-enters the retry
/// policy above.
pub async fn with_timeout<Fut, T>(timeout: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::NetworkError(format!(
            "deadline of {}ms exceeded",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, ..Default::default() }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProviderError>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_retryable_errors_up_to_max_attempts() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(ProviderError::NetworkError("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_auth_error() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(ProviderError::AuthError("bad key".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_4xx_provider_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i32> = with_retry(policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::ProviderError { status: 400, detail: "bad request".into() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_5xx_provider_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i32> = with_retry(policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::ProviderError { status: 503, detail: "unavailable".into() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::NetworkError("transient".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_maps_to_network_error() {
        let fut = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ProviderError>(1)
        };
        let result = with_timeout(Duration::from_millis(5), fut).await;
        assert!(matches!(result, Err(ProviderError::NetworkError(_))));
    }
}
