//! The capabilities conduit routes requests to.
//!
//! - **weather_agent**: Open-Meteo geocoding and forecasts rendered as cards
//! - **meetings_agent**: list, create and edit meetings in the shared store
//! - **rag_agent**: TF-IDF retrieval over a fixed corpus, with citations
//! - **web_agent**: DuckDuckGo Instant Answer search
//!
//! Each one implements [`conduit_common::Capability`]. External services sit
//! behind small traits ([`SearchBackend`], [`WeatherBackend`]) so tests can
//! substitute scripted implementations. An optional LLM client rewords the
//! deterministic output; without one the capabilities answer on their own.

pub mod config;
pub mod meetings;
pub mod phrasing;
pub mod rag;
pub mod ui;
pub mod weather;
pub mod web;

pub use config::{AgentSettings, WeatherConfig, WebSearchConfig};
pub use meetings::{MeetingCommand, MeetingsAgent};
pub use phrasing::Phraser;
pub use rag::RagAgent;
pub use weather::{
    Forecast, GeoLocation, OpenMeteoBackend, WeatherAgent, WeatherBackend, WeatherView,
};
pub use web::{DuckDuckGoBackend, SearchBackend, SearchHit, WebAgent};
