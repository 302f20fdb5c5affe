//! Transient-failure retry around any backend

use super::types::{BackendError, BackendExecutor, ModelResponse, PromptRequest};
use crate::config::RetrySettings;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Doubling backoff with up to 25% random jitter, capped at `max_delay`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.delay_ms),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        if self.jitter {
            doubled.mul_f64(1.0 + rand::random::<f64>() * 0.25)
        } else {
            doubled
        }
    }
}

/// Re-sends a prompt after transient failures
///
/// Only transport-level failures are retried. An answer that arrives but
/// carries unusable patches is the session's business.
pub struct RetryExecutor {
    inner: Arc<dyn BackendExecutor>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(inner: Arc<dyn BackendExecutor>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl BackendExecutor for RetryExecutor {
    async fn execute(&self, request: &PromptRequest) -> Result<ModelResponse, BackendError> {
        let mut retry = 0;
        loop {
            let error = match self.inner.execute(request).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            if !error.is_transient() || retry >= self.policy.max_retries {
                return Err(error);
            }

            let delay = error.retry_after().unwrap_or_else(|| self.policy.delay(retry));
            retry += 1;
            tracing::warn!(
                backend = %self.inner.name(),
                retry,
                delay_ms = delay.as_millis() as u64,
                %error,
                "transient backend error, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times before answering
    struct FlakyBackend {
        calls: AtomicU32,
        failures: u32,
        error: BackendError,
    }

    #[async_trait]
    impl BackendExecutor for FlakyBackend {
        async fn execute(&self, _request: &PromptRequest) -> Result<ModelResponse, BackendError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(self.error.clone())
            } else {
                Ok(ModelResponse::new("ok", Duration::from_millis(1)))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn flaky(failures: u32, error: BackendError) -> Arc<FlakyBackend> {
        Arc::new(FlakyBackend {
            calls: AtomicU32::new(0),
            failures,
            error,
        })
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        };
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(10), Duration::from_secs(30));
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::from_settings(&RetrySettings {
            max_retries: 2,
            delay_ms: 1000,
        });
        let delay = policy.delay(0);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1250));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let backend = flaky(2, BackendError::Transport("reset".into()));
        let executor = RetryExecutor::new(backend.clone(), fast(3));

        assert!(executor.execute(&PromptRequest::new("p")).await.is_ok());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let backend = flaky(10, BackendError::RateLimited { retry_after: None });
        let executor = RetryExecutor::new(backend.clone(), fast(2));

        let result = executor.execute(&PromptRequest::new("p")).await;
        assert!(matches!(result, Err(BackendError::RateLimited { .. })));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_pass_straight_through() {
        let backend = flaky(10, BackendError::Auth("invalid token".into()));
        let executor = RetryExecutor::new(backend.clone(), fast(5));

        let result = executor.execute(&PromptRequest::new("p")).await;
        assert!(matches!(result, Err(BackendError::Auth(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.name(), "flaky");
    }
}
