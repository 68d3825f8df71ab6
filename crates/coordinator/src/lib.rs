//! Routing and execution for conduit.
//!
//! The coordinator takes one request at a time through a fixed two-stage
//! state machine:
//!
//! 1. The [`Router`] picks a capability, asking the optional
//!    [`DecisionService`] first and falling back to the keyword table
//! 2. The [`ExecutionEngine`] runs that capability from the
//!    [`CapabilityRegistry`] and forwards every update it produces, in order,
//!    as a [`StreamEvent`](conduit_common::StreamEvent)
//!
//! # Architecture
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌─────────────────┐
//! │     Router      │  ◄── decision service (optional, bounded)
//! └────────┬────────┘
//!          │ RoutingDecision
//!    ┌─────┴──────┬────────────┬───────────┐
//!    ▼            ▼            ▼           ▼
//! [weather]   [meetings]     [rag]       [web]
//!    └─────┬──────┴────────────┴───────────┘
//!          ▼
//!   ExecutionEngine ──► events (capacity 1) ──► stream emitter
//! ```

pub mod config;
pub mod decision;
pub mod engine;
pub mod registry;
pub mod routing;
pub mod triage;

pub use config::{CoordinatorConfig, DecisionConfig};
pub use decision::{CatalogEntry, DecisionService, LlmDecisionService};
pub use engine::{degraded_message, ExecutionEngine, SessionHandle, SessionReport, SUPERVISOR_NODE};
pub use registry::CapabilityRegistry;
pub use routing::{KeywordRule, KeywordTable, RouterStatsSnapshot, RoutingDecision, RoutingMode};
pub use triage::Router;
