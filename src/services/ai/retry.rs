use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionRequest, LlmProvider};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn once(backoff: Duration) -> Self {
        Self {
            max_retries: 1,
            backoff,
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }
}

/// Runs `call`, re-running it up to `policy.max_retries` times while it
/// fails with a retryable error. Non-retryable errors return immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut call: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                attempt += 1;
                tracing::warn!(error = %e, attempt, "{label} failed, retrying");
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wraps any provider so every completion goes through [`with_retry`].
pub struct RetryingLlm<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: LlmProvider> RetryingLlm<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<P: LlmProvider> LlmProvider for RetryingLlm<P> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError> {
        with_retry(&self.policy, "completion", move || self.inner.complete(request)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::once(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result = with_retry(&policy(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result = with_retry(&policy(), "test", move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(AppError::transient("503"))
            } else {
                Ok("recovered")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_one_retry() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&policy(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Quota("429".into()))
        })
        .await;
        assert!(matches!(result, Err(AppError::Quota(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&policy(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::provider("400 bad request"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_never_retries() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&RetryPolicy::none(), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::transient("timeout"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for Flaky {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, AppError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::transient("timed out"))
            } else {
                Ok("greeting".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_retrying_llm_wraps_provider() {
        let llm = RetryingLlm::new(
            Flaky {
                calls: AtomicUsize::new(0),
            },
            policy(),
        );
        let request = CompletionRequest::text("hi".to_string(), 0.0);
        assert_eq!(llm.complete(&request).await.unwrap(), "greeting");
        assert_eq!(llm.inner.calls.load(Ordering::SeqCst), 2);
    }
}
