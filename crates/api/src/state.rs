//! Application state for the API server.

use conduit_coordinator::{CoordinatorConfig, ExecutionEngine};
use conduit_memory::MeetingStore;
use std::sync::Arc;

/// Shared application state for the API server.
pub struct AppState {
    /// Routes and runs every session
    pub engine: ExecutionEngine,

    /// The meetings calendar, shared by every session and counted on `/health`
    pub store: Arc<MeetingStore>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create application state from the coordinator configuration.
    pub fn new(config: &CoordinatorConfig) -> conduit_common::Result<Self> {
        let store = Arc::new(MeetingStore::new());
        let engine = ExecutionEngine::from_config(config, store.clone())?;
        Ok(Self::with_engine(engine, store))
    }

    /// Wrap an already built engine.
    pub fn with_engine(engine: ExecutionEngine, store: Arc<MeetingStore>) -> Self {
        Self {
            engine,
            store,
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
