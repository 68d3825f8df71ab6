//! Configuration for the capabilities in this crate.

use serde::{Deserialize, Serialize};

/// Per-capability LLM settings.
///
/// Only consulted when an LLM client is configured. Without one, every
/// capability returns its deterministic output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// System prompt used when phrasing output (optional, a built-in default
    /// applies if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Turn LLM phrasing off for this capability even when a client exists
    pub disable_llm: bool,
}

/// Search backend settings for `web_agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub endpoint: String,
    pub max_results: usize,
    pub timeout_ms: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.duckduckgo.com/".to_string(),
            max_results: 3,
            timeout_ms: 10_000,
        }
    }
}

/// Open-Meteo endpoints for `weather_agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub timeout_ms: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timeout_ms: 10_000,
        }
    }
}
