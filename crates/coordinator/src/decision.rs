//! The optional external decision service.
//!
//! The router can ask a decision service to pick a capability before falling
//! back to keywords. Answers are untrusted: they are reduced to a single token
//! and only accepted if that token names a registered capability.

use async_trait::async_trait;
use conduit_common::{CapabilityName, ConduitError, Result};
use conduit_llm::{LlmClient, LlmRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Input longer than this is never sent to the decision service.
pub const MAX_INPUT_CONTENT_LENGTH: usize = 10_000;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a request router. Reply with exactly one capability name and nothing else.";

/// One registered capability as offered to the decision service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: CapabilityName,
    pub description: String,
}

impl CatalogEntry {
    pub fn new(name: CapabilityName, description: impl Into<String>) -> Self {
        Self {
            name,
            description: description.into(),
        }
    }
}

/// Picks a capability for a request.
///
/// Implementations may fail or stall freely; the router bounds every call
/// and falls back to keyword routing.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Return the name of the capability that should handle `text`.
    async fn decide(&self, text: &str, catalog: &[CatalogEntry]) -> Result<String>;
}

/// Reject input the decision service should not see.
pub fn validate_input_content(content: &str) -> Result<()> {
    if content.len() > MAX_INPUT_CONTENT_LENGTH {
        return Err(ConduitError::RoutingDegraded(format!(
            "Input content exceeds maximum length of {MAX_INPUT_CONTENT_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Reduce a free-form answer to a candidate capability name: first
/// whitespace-separated token, stripped of punctuation and backticks,
/// lower-cased.
pub fn normalize_answer(answer: &str) -> String {
    answer
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '_')
        .to_lowercase()
}

/// Match a normalised answer against the catalog.
pub fn resolve_answer(answer: &str, catalog: &[CatalogEntry]) -> Result<CapabilityName> {
    let token = normalize_answer(answer);
    catalog
        .iter()
        .find(|entry| entry.name.as_str() == token)
        .map(|entry| entry.name)
        .ok_or_else(|| {
            ConduitError::RoutingDegraded(format!(
                "Decision service named an unregistered capability: '{token}'"
            ))
        })
}

/// Build the routing prompt from the catalog.
pub fn build_prompt(text: &str, catalog: &[CatalogEntry]) -> String {
    let names: Vec<&str> = catalog.iter().map(|entry| entry.name.as_str()).collect();
    let guidance: String = catalog
        .iter()
        .map(|entry| format!("- {}: {}\n", entry.name, entry.description))
        .collect();

    format!(
        "Choose the single best specialist agent for the user's request. \
         Return ONLY one of these exact tokens: {}.\n\n\
         Routing guidance:\n{guidance}\n\
         User message: {text}",
        names.join(", ")
    )
}

/// Decision service backed by a chat-completion model.
pub struct LlmDecisionService {
    client: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl LlmDecisionService {
    pub fn new(client: Arc<dyn LlmClient>, system_prompt: Option<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

#[async_trait]
impl DecisionService for LlmDecisionService {
    async fn decide(&self, text: &str, catalog: &[CatalogEntry]) -> Result<String> {
        let request = LlmRequest::prompt(&self.system_prompt, build_prompt(text, catalog))
            .with_temperature(Some(0.0))
            .with_max_tokens(Some(16));

        let response = self.client.complete(request).await?;
        match response.text() {
            Some(answer) => {
                debug!(model = %response.model, answer = %answer, "Decision service answered");
                Ok(answer.to_string())
            }
            None => {
                warn!(model = %response.model, "Decision service returned an empty answer");
                Err(ConduitError::RoutingDegraded(
                    "Decision service returned an empty answer".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_llm::LlmResponse;
    use parking_lot::Mutex;

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new(CapabilityName::WeatherAgent, "weather and forecasts"),
            CatalogEntry::new(CapabilityName::WebAgent, "web search"),
        ]
    }

    struct RecordingLlm {
        answer: String,
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.seen.lock().push(request);
            Ok(LlmResponse {
                content: self.answer.clone(),
                model: "scripted".into(),
                usage: None,
                finish_reason: None,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("  `Weather_Agent`. because rain"), "weather_agent");
        assert_eq!(normalize_answer("web_agent\n"), "web_agent");
        assert_eq!(normalize_answer("\"rag_agent\","), "rag_agent");
        assert_eq!(normalize_answer(""), "");
    }

    #[test]
    fn test_resolve_rejects_unregistered_names() {
        assert_eq!(
            resolve_answer("weather_agent", &catalog()).unwrap(),
            CapabilityName::WeatherAgent
        );
        let err = resolve_answer("meetings_agent", &catalog()).unwrap_err();
        assert!(matches!(err, ConduitError::RoutingDegraded(_)));
        assert!(resolve_answer("calendar_agent", &catalog()).is_err());
    }

    #[test]
    fn test_input_length_limit() {
        assert!(validate_input_content("weather in Paris").is_ok());
        let long = "a".repeat(MAX_INPUT_CONTENT_LENGTH + 1);
        assert!(matches!(
            validate_input_content(&long),
            Err(ConduitError::RoutingDegraded(_))
        ));
    }

    #[test]
    fn test_prompt_lists_catalog() {
        let prompt = build_prompt("is it raining?", &catalog());
        assert!(prompt.contains("weather_agent, web_agent"));
        assert!(prompt.contains("- weather_agent: weather and forecasts"));
        assert!(prompt.ends_with("User message: is it raining?"));
    }

    #[tokio::test]
    async fn test_llm_service_sends_deterministic_request() {
        let llm = Arc::new(RecordingLlm {
            answer: "web_agent".into(),
            seen: Mutex::new(Vec::new()),
        });
        let service = LlmDecisionService::new(llm.clone(), None);

        let answer = service.decide("who won?", &catalog()).await.unwrap();
        assert_eq!(answer, "web_agent");

        let seen = llm.seen.lock();
        assert_eq!(seen[0].temperature, Some(0.0));
        assert_eq!(seen[0].system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_llm_service_rejects_blank_answer() {
        let llm = Arc::new(RecordingLlm {
            answer: "   ".into(),
            seen: Mutex::new(Vec::new()),
        });
        let service = LlmDecisionService::new(llm, Some("route".into()));
        assert!(service.decide("hi", &catalog()).await.is_err());
    }
}
