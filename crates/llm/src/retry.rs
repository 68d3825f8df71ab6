use async_trait::async_trait;
use conduit_common::{ConduitError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Retries rate-limited and server-side failures with exponential backoff.
///
/// Dropping the returned future abandons any pending sleep, so a caller that
/// bounds the call by a timeout or a cancellation token never waits out the
/// backoff.
pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn is_retryable(error: &ConduitError) -> bool {
        match error {
            ConduitError::Upstream { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    fn compute_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        // Spread concurrent retries by up to 10%.
        let spread = (attempt.wrapping_mul(2_654_435_761) % 100) as f64 / 1000.0;
        let delay = (base * (1.0 + spread)) as u64;
        Duration::from_millis(delay.min(self.config.max_delay_ms))
    }
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.config.max_retries && Self::is_retryable(&e) => {
                    let delay = self.compute_delay(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying LLM request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with `status` for the first `failures` calls.
    struct FlakyClient {
        failures: u32,
        status: u16,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ConduitError::Upstream {
                    status: self.status,
                    body: "nope".to_string(),
                });
            }
            Ok(LlmResponse {
                content: "ok".to_string(),
                model: "flaky".to_string(),
                usage: None,
                finish_reason: None,
            })
        }
        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn classifies_by_status() {
        let upstream = |status| ConduitError::Upstream {
            status,
            body: String::new(),
        };
        assert!(RetryingClient::<FlakyClient>::is_retryable(&upstream(429)));
        assert!(RetryingClient::<FlakyClient>::is_retryable(&upstream(503)));
        assert!(!RetryingClient::<FlakyClient>::is_retryable(&upstream(401)));
        assert!(!RetryingClient::<FlakyClient>::is_retryable(&ConduitError::Llm(
            "malformed".into()
        )));
    }

    #[test]
    fn delay_is_capped() {
        let client = RetryingClient::new(
            FlakyClient {
                failures: 0,
                status: 500,
                calls: AtomicU32::new(0),
            },
            RetryConfig {
                max_retries: 5,
                initial_delay_ms: 500,
                max_delay_ms: 2000,
                backoff_multiplier: 10.0,
            },
        );
        assert!(client.compute_delay(5) <= Duration::from_millis(2000));
        assert!(client.compute_delay(0) >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let client = RetryingClient::new(
            FlakyClient {
                failures: 2,
                status: 502,
                calls: AtomicU32::new(0),
            },
            fast_config(3),
        );

        let response = client.complete(LlmRequest::default()).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_on_client_errors() {
        let client = RetryingClient::new(
            FlakyClient {
                failures: 10,
                status: 400,
                calls: AtomicU32::new(0),
            },
            fast_config(3),
        );

        let err = client.complete(LlmRequest::default()).await.unwrap_err();
        assert!(matches!(err, ConduitError::Upstream { status: 400, .. }));
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_after_max_retries() {
        let client = RetryingClient::new(
            FlakyClient {
                failures: 10,
                status: 500,
                calls: AtomicU32::new(0),
            },
            fast_config(2),
        );

        assert!(client.complete(LlmRequest::default()).await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }
}
