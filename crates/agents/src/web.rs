//! Web search capability.

use crate::config::{AgentSettings, WebSearchConfig};
use crate::phrasing::Phraser;
use crate::ui;
use async_trait::async_trait;
use conduit_common::{
    Capability, CapabilityName, ConduitError, NodeUpdate, RequestSession, Result,
};
use conduit_llm::LlmClient;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const NO_RESULTS: &str = "No search results found.";

const SNIPPET_CHARS: usize = 120;

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Anything that can turn a query into search hits.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

// ============================================================================
// DuckDuckGo Instant Answer backend
// ============================================================================

#[derive(Deserialize, Default)]
#[serde(default)]
struct InstantAnswer {
    #[serde(rename = "Heading")]
    heading: String,
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    #[serde(rename = "Results")]
    results: Vec<Topic>,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<Topic>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Topic {
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    #[serde(rename = "Topics")]
    topics: Vec<Topic>,
}

impl Topic {
    fn collect_hits(&self, out: &mut Vec<SearchHit>) {
        if !self.text.is_empty() {
            let title = self
                .text
                .split(" - ")
                .next()
                .unwrap_or(&self.text)
                .to_string();
            out.push(SearchHit {
                title,
                snippet: self.text.clone(),
                link: self.first_url.clone(),
            });
        }
        for topic in &self.topics {
            topic.collect_hits(out);
        }
    }
}

impl InstantAnswer {
    fn into_hits(self, max_results: usize) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        if !self.abstract_text.is_empty() {
            hits.push(SearchHit {
                title: self.heading.clone(),
                snippet: self.abstract_text.clone(),
                link: self.abstract_url.clone(),
            });
        }
        for topic in self.results.iter().chain(&self.related_topics) {
            topic.collect_hits(&mut hits);
        }
        hits.truncate(max_results);
        hits
    }
}

/// Queries the DuckDuckGo Instant Answer API. No key required.
#[derive(Clone)]
pub struct DuckDuckGoBackend {
    endpoint: String,
    client: Client,
}

impl DuckDuckGoBackend {
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConduitError::Config(format!("Failed to build search client: {e}")))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| ConduitError::CapabilityUnavailable(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConduitError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| ConduitError::CapabilityUnavailable(format!("unreadable search response: {e}")))?;
        Ok(answer.into_hits(max_results))
    }
}

// ============================================================================
// Capability
// ============================================================================

/// Numbered result lines: `1. title – snippet (link)`.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let title = if hit.title.trim().is_empty() {
                "Untitled"
            } else {
                hit.title.as_str()
            };
            let snippet: String = hit.snippet.chars().take(SNIPPET_CHARS).collect();
            let mut line = format!("{}. {} – {}", i + 1, title, snippet);
            if !hit.link.is_empty() {
                line.push_str(&format!(" ({})", hit.link));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct WebAgent {
    backend: Arc<dyn SearchBackend>,
    max_results: usize,
    phraser: Phraser,
}

impl WebAgent {
    pub fn new(backend: Arc<dyn SearchBackend>, max_results: usize, phraser: Phraser) -> Self {
        Self {
            backend,
            max_results,
            phraser,
        }
    }

    pub fn from_config(
        config: &WebSearchConfig,
        llm: Option<Arc<dyn LlmClient>>,
        settings: &AgentSettings,
    ) -> Result<Self> {
        Ok(Self::new(
            Arc::new(DuckDuckGoBackend::new(config)?),
            config.max_results,
            Phraser::new(llm, settings),
        ))
    }
}

#[async_trait]
impl Capability for WebAgent {
    fn name(&self) -> CapabilityName {
        CapabilityName::WebAgent
    }

    fn description(&self) -> &str {
        "Searches the web and answers general questions"
    }

    async fn run(&self, session: &RequestSession) -> Result<NodeUpdate> {
        let query = session.request().message();
        session
            .progress(NodeUpdate::text("Searching the web…"))
            .await?;

        let hits = match session
            .bounded(self.backend.search(query, self.max_results))
            .await?
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Search backend unavailable");
                Vec::new()
            }
        };
        info!(session_id = %session.id(), hits = hits.len(), "Web search finished");

        if hits.is_empty() {
            if !self.phraser.is_enabled() {
                return Ok(NodeUpdate::text(NO_RESULTS));
            }
            let prompt = format!(
                "A user asked the following question, but web search returned no results. \
                 Answer as best you can from general knowledge, and clearly say that \
                 live search returned no results.\n\nUser question: {query}"
            );
            let output = self
                .phraser
                .phrase(session, prompt, NO_RESULTS.to_string())
                .await?;
            return Ok(NodeUpdate::text(output));
        }

        let summary = format_hits(&hits);
        let prompt = format!(
            "A user asked the following question:\n\n{query}\n\n\
             Here are the top web search results:\n\n{summary}\n\n\
             Answer the user concisely based only on these results. \
             If the results are insufficient, say so."
        );
        let output = self.phraser.phrase(session, prompt, summary.clone()).await?;
        let links: Vec<String> = hits.into_iter().map(|h| h.link).collect();

        Ok(NodeUpdate::text(output).with_a2ui(ui::panel("Web search", &summary, &links)))
    }
}
