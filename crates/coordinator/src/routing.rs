//! Routing decision types, router counters and the keyword table.

use conduit_common::CapabilityName;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// How a routing decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// The external decision service named the capability
    DecisionService,
    /// A trigger keyword matched
    Keyword,
    /// Nothing matched; the default capability was used
    Default,
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DecisionService => "decision_service",
            Self::Keyword => "keyword",
            Self::Default => "default",
        };
        f.write_str(s)
    }
}

/// The result of routing one request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The chosen capability
    pub capability: CapabilityName,

    /// How the capability was chosen
    pub mode: RoutingMode,

    /// Short explanation (matched trigger, decision service answer, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

impl RoutingDecision {
    pub fn decision_service(capability: CapabilityName, answer: impl Into<String>) -> Self {
        Self {
            capability,
            mode: RoutingMode::DecisionService,
            rationale: Some(format!("decision service answered '{}'", answer.into())),
            confidence: 0.9,
        }
    }

    pub fn keyword(capability: CapabilityName, trigger: &str) -> Self {
        Self {
            capability,
            mode: RoutingMode::Keyword,
            rationale: Some(format!("matched trigger '{trigger}'")),
            confidence: 0.75,
        }
    }

    pub fn fallback(capability: CapabilityName) -> Self {
        Self {
            capability,
            mode: RoutingMode::Default,
            rationale: Some("no trigger matched".to_string()),
            confidence: 0.5,
        }
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Lock-free router counters, shared by every session.
#[derive(Debug, Default)]
pub struct RouterStats {
    decision_service: AtomicU64,
    keyword: AtomicU64,
    default: AtomicU64,
    degraded: AtomicU64,
}

/// Point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStatsSnapshot {
    pub decision_service: u64,
    pub keyword: u64,
    pub default: u64,
    pub degraded: u64,
}

impl RouterStats {
    pub fn record(&self, mode: RoutingMode) {
        let counter = match mode {
            RoutingMode::DecisionService => &self.decision_service,
            RoutingMode::Keyword => &self.keyword,
            RoutingMode::Default => &self.default,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            decision_service: self.decision_service.load(Ordering::Relaxed),
            keyword: self.keyword.load(Ordering::Relaxed),
            default: self.default.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Keyword table
// ============================================================================

/// Split text into lower-cased runs of alphanumerics and `-`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// One row of the keyword table.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub capability: CapabilityName,
    /// Each trigger is a sequence of tokens matched contiguously.
    triggers: Vec<Vec<String>>,
}

impl KeywordRule {
    pub fn new<'a>(capability: CapabilityName, triggers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            capability,
            triggers: triggers
                .into_iter()
                .map(tokenize)
                .filter(|trigger| !trigger.is_empty())
                .collect(),
        }
    }

    /// The first trigger present in `tokens`, joined back with spaces.
    fn matched(&self, tokens: &[String]) -> Option<String> {
        self.triggers
            .iter()
            .find(|trigger| tokens.windows(trigger.len()).any(|w| w == trigger.as_slice()))
            .map(|trigger| trigger.join(" "))
    }
}

/// Ordered (capability, triggers) pairs. Earlier rows win ties.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    rules: Vec<KeywordRule>,
}

impl KeywordTable {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    /// The built-in table in registration order.
    pub fn standard() -> Self {
        Self::new(vec![
            KeywordRule::new(
                CapabilityName::WeatherAgent,
                [
                    "weather",
                    "forecast",
                    "temperature",
                    "rain",
                    "snow",
                    "wind",
                    "humidity",
                    "aqi",
                    "air quality",
                ],
            ),
            KeywordRule::new(
                CapabilityName::MeetingsAgent,
                ["meeting", "meetings", "schedule", "agenda", "notes", "calendar"],
            ),
            KeywordRule::new(
                CapabilityName::RagAgent,
                [
                    "document",
                    "documents",
                    "doc",
                    "docs",
                    "citation",
                    "citations",
                    "reference",
                    "references",
                ],
            ),
            KeywordRule::new(
                CapabilityName::WebAgent,
                ["search", "web", "internet", "look up"],
            ),
        ])
    }

    /// Drop rows whose capability fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(CapabilityName) -> bool) {
        self.rules.retain(|rule| keep(rule.capability));
    }

    pub fn capabilities(&self) -> impl Iterator<Item = CapabilityName> + '_ {
        self.rules.iter().map(|rule| rule.capability)
    }

    /// First row with a trigger present in `text`, with the trigger that hit.
    pub fn lookup(&self, text: &str) -> Option<(CapabilityName, String)> {
        let tokens = tokenize(text);
        self.rules
            .iter()
            .find_map(|rule| rule.matched(&tokens).map(|trigger| (rule.capability, trigger)))
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::standard()
    }
}
