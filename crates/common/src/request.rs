//! Inbound request type.

use serde::{Deserialize, Serialize};

/// An immutable inbound request.
///
/// Created at ingress and owned by the request session for its lifetime.
/// Fields are private so nothing downstream can mutate the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    id: String,
    message: String,
    received_at: u64,
}

impl Request {
    /// Create a request with a generated identifier.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
            received_at: now_millis(),
        }
    }

    /// Create a request carrying a caller-supplied identifier.
    ///
    /// Blank identifiers are replaced by a generated one.
    pub fn with_id(id: impl Into<String>, message: impl Into<String>) -> Self {
        let id = id.into();
        let mut request = Self::new(message);
        if !id.trim().is_empty() {
            request.id = id;
        }
        request
    }

    /// Caller-supplied or generated identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw request text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Arrival timestamp (Unix millis).
    pub fn received_at(&self) -> u64 {
        self.received_at
    }

    /// Short prefix of the message for log fields.
    pub fn preview(&self) -> String {
        self.message.chars().take(50).collect()
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
