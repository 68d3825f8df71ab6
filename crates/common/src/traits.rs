//! The capability contract and the closed set of capability names.
//!
//! These live in `conduit-common` so that the agents crate can implement them
//! and the coordinator can dispatch to them without a circular dependency.

use crate::error::{ConduitError, Result};
use crate::session::RequestSession;
use crate::update::NodeUpdate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every capability the system knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityName {
    /// Weather lookups and forecasts
    WeatherAgent,
    /// Meeting calendar management
    MeetingsAgent,
    /// Answers from the internal document corpus
    RagAgent,
    /// Web search and general questions
    WebAgent,
}

impl CapabilityName {
    pub const ALL: [CapabilityName; 4] = [
        Self::WeatherAgent,
        Self::MeetingsAgent,
        Self::RagAgent,
        Self::WebAgent,
    ];

    /// Node name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WeatherAgent => "weather_agent",
            Self::MeetingsAgent => "meetings_agent",
            Self::RagAgent => "rag_agent",
            Self::WebAgent => "web_agent",
        }
    }

    /// Human-facing label used in degraded messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::WeatherAgent => "the weather assistant",
            Self::MeetingsAgent => "the meetings assistant",
            Self::RagAgent => "the document assistant",
            Self::WebAgent => "the web assistant",
        }
    }
}

impl std::fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityName {
    type Err = ConduitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ConduitError::UnknownCapability(s.to_string()))
    }
}

/// The contract every worker implements.
///
/// A capability may report any number of intermediate updates through
/// [`RequestSession::progress`] and returns exactly one terminal update.
/// It must treat the request as read-only and bound every external call
/// with [`RequestSession::bounded`].
#[async_trait]
pub trait Capability: Send + Sync {
    /// The name this capability is registered under.
    fn name(&self) -> CapabilityName;

    /// One-line description offered to the decision service.
    fn description(&self) -> &str;

    /// Handle one request and return the terminal update.
    async fn run(&self, session: &RequestSession) -> Result<NodeUpdate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_str() {
        for name in CapabilityName::ALL {
            assert_eq!(name.as_str().parse::<CapabilityName>().unwrap(), name);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = "calendar_agent".parse::<CapabilityName>().unwrap_err();
        assert!(matches!(err, ConduitError::UnknownCapability(_)));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&CapabilityName::MeetingsAgent).unwrap();
        assert_eq!(json, "\"meetings_agent\"");
    }
}
