//! The shared meetings store.
//!
//! This is the only state mutated by more than one session. A single mutex
//! guards the whole mapping, so every read sees complete records and
//! concurrent creates never lose an entry. The guard is a `parking_lot` guard,
//! which is not `Send`; holding it across an `.await` in a spawned task does not
//! compile.

use crate::types::{Meeting, MeetingId, MeetingPatch, NewMeeting};
use conduit_common::{ConduitError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
struct Inner {
    next_id: MeetingId,
    meetings: BTreeMap<MeetingId, Meeting>,
}

/// In-memory meeting calendar shared by all sessions.
#[derive(Debug)]
pub struct MeetingStore {
    inner: Mutex<Inner>,
}

impl Default for MeetingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeetingStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                meetings: BTreeMap::new(),
            }),
        }
    }

    /// All meetings ordered by identifier.
    pub fn list(&self) -> Vec<Meeting> {
        self.inner.lock().meetings.values().cloned().collect()
    }

    pub fn get(&self, id: MeetingId) -> Option<Meeting> {
        self.inner.lock().meetings.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a new meeting and return its identifier.
    pub fn create(&self, meeting: NewMeeting) -> MeetingId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.meetings.insert(
            id,
            Meeting {
                id,
                title: meeting.title,
                date: meeting.date,
                agenda: meeting.agenda,
                notes: String::new(),
            },
        );
        debug!(meeting_id = id, total = inner.meetings.len(), "Created meeting");
        id
    }

    /// Apply `patch` to an existing meeting.
    ///
    /// Fails with [`ConduitError::NotFound`] and leaves the store untouched
    /// when `id` does not exist.
    pub fn edit(&self, id: MeetingId, patch: MeetingPatch) -> Result<Meeting> {
        let mut inner = self.inner.lock();
        let current = inner
            .meetings
            .get(&id)
            .ok_or_else(|| ConduitError::NotFound(format!("meeting {id}")))?;
        let updated = patch.apply_to(current);
        inner.meetings.insert(id, updated.clone());
        debug!(meeting_id = id, "Edited meeting");
        Ok(updated)
    }
}
