//! Retrieval capability: best document from the corpus, with a citation.

use crate::config::AgentSettings;
use crate::phrasing::Phraser;
use crate::ui;
use async_trait::async_trait;
use conduit_common::{Capability, CapabilityName, NodeUpdate, RequestSession, Result};
use conduit_llm::LlmClient;
use conduit_memory::Corpus;
use std::sync::Arc;
use tracing::debug;

pub const NO_DOCUMENT: &str = "No relevant document found.";

pub struct RagAgent {
    corpus: Corpus,
    phraser: Phraser,
}

impl RagAgent {
    pub fn new(corpus: Corpus, phraser: Phraser) -> Self {
        Self { corpus, phraser }
    }

    pub fn from_config(llm: Option<Arc<dyn LlmClient>>, settings: &AgentSettings) -> Self {
        Self::new(Corpus::default_corpus(), Phraser::new(llm, settings))
    }
}

#[async_trait]
impl Capability for RagAgent {
    fn name(&self) -> CapabilityName {
        CapabilityName::RagAgent
    }

    fn description(&self) -> &str {
        "Answers from the internal document collection with a citation"
    }

    async fn run(&self, session: &RequestSession) -> Result<NodeUpdate> {
        let query = session.request().message();
        let Some(best) = self.corpus.best(query) else {
            return Ok(NodeUpdate::text(NO_DOCUMENT).with_a2ui(ui::panel("RAG", NO_DOCUMENT, &[])));
        };
        let citation = best.citation();
        debug!(session_id = %session.id(), %citation, score = best.score, "Selected document");

        let prompt = format!(
            "Use the following information to answer the question. Document:\n\n{}\n\n\
             Question: {query}\n\nAnswer in a concise and direct manner.",
            best.content
        );
        let content = self.phraser.phrase(session, prompt, best.content).await?;
        let text = format!("{content} (Citation: {citation})");

        Ok(NodeUpdate::text(text.clone()).with_a2ui(ui::panel("RAG", &text, &[])))
    }
}
