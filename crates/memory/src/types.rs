//! Meeting records and retrieval documents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store, starting at 1.
pub type MeetingId = u64;

/// A stored meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub agenda: String,
    #[serde(default)]
    pub notes: String,
}

/// Fields for a meeting that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMeeting {
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub agenda: String,
}

impl NewMeeting {
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            date,
            agenda: String::new(),
        }
    }

    pub fn with_agenda(mut self, agenda: impl Into<String>) -> Self {
        self.agenda = agenda.into();
        self
    }
}

/// A partial update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.date.is_none() && self.agenda.is_none() && self.notes.is_none()
    }

    /// Return `meeting` with this patch applied.
    pub fn apply_to(&self, meeting: &Meeting) -> Meeting {
        let mut updated = meeting.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(date) = self.date {
            updated.date = date;
        }
        if let Some(agenda) = &self.agenda {
            updated.agenda = agenda.clone();
        }
        if let Some(notes) = &self.notes {
            updated.notes = notes.clone();
        }
        updated
    }
}

/// A document in the retrieval corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}
