use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_common::{ConduitError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: u64,
    pub max_concurrent_requests: usize,
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_url: None,
            temperature: Some(0.0),
            max_tokens: None,
            timeout_ms: 30_000,
            max_concurrent_requests: 4,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// The configured key, else the value of `OPENAI_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

/// Caps the number of in-flight requests to the wrapped client.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Semaphore,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Semaphore::new(max_concurrent.max(1)),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ConduitError::Llm(format!("Request limiter closed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the client stack: provider, retries, then the concurrency cap.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let base_client: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" => Box::new(OpenAiClient::with_timeout(
            config.api_url.clone(),
            config.model.clone(),
            config.resolved_api_key(),
            Duration::from_millis(config.timeout_ms),
        )?),
        other => {
            return Err(ConduitError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    let retrying: Box<dyn LlmClient> =
        Box::new(RetryingClient::new(base_client, config.retry.clone()));

    Ok(Arc::new(SemaphoredClient::new(
        Arc::from(retrying),
        config.max_concurrent_requests,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(
            r#"
model = "llama3"
api_url = "http://localhost:11434"
max_concurrent_requests = 8

[retry]
max_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 250);
    }

    #[test]
    fn configured_key_wins_over_environment() {
        let config = LlmConfig {
            api_key: Some("sk-configured".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolved_api_key().as_deref(), Some("sk-configured"));
    }

    #[test]
    fn build_openai_client() {
        let config = LlmConfig {
            model: "llama3".to_string(),
            ..Default::default()
        };
        let client = build_llm_client(&config).unwrap();
        assert_eq!(client.model_name(), "llama3");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_llm_client(&config),
            Err(ConduitError::Config(_))
        ));
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        struct CountingClient {
            concurrent: AtomicU32,
            max_seen: AtomicU32,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "ok".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let inner = Arc::new(CountingClient {
            concurrent: AtomicU32::new(0),
            max_seen: AtomicU32::new(0),
        });
        let semaphored = Arc::new(SemaphoredClient::new(inner.clone(), 2));

        let mut handles = vec![];
        for _ in 0..6 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client.complete(LlmRequest::default()).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(inner.max_seen.load(Ordering::SeqCst) <= 2);
    }
}
