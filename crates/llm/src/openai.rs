use async_trait::async_trait;
use conduit_common::{ConduitError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::client::{LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for any server speaking the OpenAI chat-completions protocol.
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, model, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: Option<String>,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConduitError::Config(format!("Failed to build HTTP client: {e}")))?;
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            base_url,
            model,
            api_key,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_body<'a>(&'a self, request: &'a LlmRequest) -> ChatCompletionRequest<'a> {
        let system = request.system_prompt.as_deref().map(|content| WireMessage {
            role: Role::System,
            content,
        });
        let messages = system
            .into_iter()
            .chain(request.messages.iter().map(|m| WireMessage {
                role: m.role,
                content: &m.content,
            }))
            .collect();
        ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = self.build_body(&request);

        let mut http_req = self.http_client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ConduitError::Llm(format!("Chat completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConduitError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ConduitError::Llm(format!("Malformed chat completion: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ConduitError::Llm("Chat completion had no choices".to_string()))?;

        debug!(model = %parsed.model, finish_reason = ?choice.finish_reason, "Chat completion received");

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
