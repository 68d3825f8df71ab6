//! Common types and traits shared across conduit crates.
//!
//! This crate provides the request/update data model, the per-request
//! session, the capability contract and the error taxonomy that every other
//! crate builds on.

pub mod error;
pub mod event;
pub mod request;
pub mod session;
pub mod traits;
pub mod update;

pub use error::{ConduitError, Result};
pub use event::{GraphState, StreamEvent};
pub use request::{now_millis, Request};
pub use session::{RequestSession, SessionState};
pub use traits::{Capability, CapabilityName};
pub use update::{
    A2uiPayload, KnownNode, KvItem, Link, NodeUpdate, RenderNode, RichContent, A2UI_SCHEMA,
    A2UI_VERSION,
};
