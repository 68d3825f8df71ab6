//! Chat-completion client for conduit.
//!
//! Used by the router's decision service and by capabilities that rephrase
//! their deterministic output. Every client sits behind the [`LlmClient`]
//! trait so callers can be tested with a scripted implementation.

pub mod client;
pub mod config;
pub mod openai;
pub mod retry;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{build_llm_client, LlmConfig, SemaphoredClient};
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
