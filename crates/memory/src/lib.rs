//! State shared across conduit sessions and the retrieval corpus.
//!
//! - [`MeetingStore`]: the in-memory meeting calendar, the only mutable state
//!   that outlives a single request
//! - [`Corpus`]: a small fixed document set scored with TF-IDF

pub mod retrieval;
pub mod store;
pub mod types;

pub use retrieval::{tokenize, Corpus, ScoredDocument};
pub use store::MeetingStore;
pub use types::{Document, Meeting, MeetingId, MeetingPatch, NewMeeting};
