//! Optional LLM rewording of deterministic capability output.

use crate::config::AgentSettings;
use conduit_common::{RequestSession, Result};
use conduit_llm::{LlmClient, LlmRequest};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a concise assistant. Answer using only the information you are given.";

/// Wraps an optional LLM client. Every failure falls back to the text the
/// capability already produced.
#[derive(Clone, Default)]
pub struct Phraser {
    client: Option<Arc<dyn LlmClient>>,
    system_prompt: Option<String>,
}

impl Phraser {
    pub fn new(client: Option<Arc<dyn LlmClient>>, settings: &AgentSettings) -> Self {
        Self {
            client: client.filter(|_| !settings.disable_llm),
            system_prompt: settings.system_prompt.clone(),
        }
    }

    /// A phraser that always returns the fallback.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Ask the LLM for a rewording of `fallback` guided by `prompt`.
    ///
    /// Only cancellation is propagated. Errors and blank answers yield
    /// `fallback`.
    pub async fn phrase(
        &self,
        session: &RequestSession,
        prompt: String,
        fallback: String,
    ) -> Result<String> {
        let Some(client) = &self.client else {
            return Ok(fallback);
        };

        let system = self
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let request = LlmRequest::prompt(system, prompt);

        match session.bounded(client.complete(request)).await? {
            Ok(response) => match response.text() {
                Some(text) => {
                    debug!(session_id = %session.id(), model = %response.model, "Phrased output");
                    Ok(text.to_string())
                }
                None => Ok(fallback),
            },
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "LLM phrasing failed, using plain output");
                Ok(fallback)
            }
        }
    }
}
