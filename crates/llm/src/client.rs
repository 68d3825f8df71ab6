use async_trait::async_trait;
use conduit_common::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// A single-turn request: one system prompt, one user message.
    pub fn prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system.into()),
            messages: vec![ChatMessage::user(user)],
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    /// Content with surrounding whitespace removed, or `None` if blank.
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.content.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;
    fn model_name(&self) -> &str;
}

#[async_trait]
impl LlmClient for Box<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
