//! Error taxonomy for conduit.
//!
//! Most variants are recovered locally before anything reaches a client
//! stream. Only [`ConduitError::CapabilityFault`] and
//! [`ConduitError::UnknownCapability`] end a session in the failed state,
//! and even then the client only ever sees a degraded, user-safe message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConduitError {
    /// The external decision service could not produce a usable answer.
    /// Recovered by keyword routing.
    #[error("Routing degraded: {0}")]
    RoutingDegraded(String),

    /// No capability could be selected and no default is configured.
    #[error("No capability matched the request")]
    NoCapabilityMatched,

    /// An external dependency of a capability (search, geocoding, ...) is down.
    /// Recovered by the capability with an explicit empty-result update.
    #[error("Capability dependency unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The capability itself failed unexpectedly.
    #[error("Capability fault: {0}")]
    CapabilityFault(String),

    /// Routing named a capability that has no registered handler.
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// The client went away or the session was cancelled explicitly.
    #[error("Session cancelled")]
    SessionCancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("LLM error: {0}")]
    Llm(String),

    /// Upstream HTTP service answered with a non-success status.
    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConduitError {
    /// Whether this error means the session should stop silently.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::SessionCancelled)
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;
