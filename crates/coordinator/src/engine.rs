//! The execution engine: route, execute, forward updates in order.
//!
//! ```text
//! Request ──► Router ──► RoutingDecision ──► CapabilityRegistry
//!                                                   │
//!                     progress (capacity 1)         ▼
//!   StreamEvent ◄── engine loop ◄────────────── Capability::run
//!        │
//!        ▼  (capacity 1)
//!   stream emitter
//! ```
//!
//! One task per session. The engine is the only producer of events for that
//! session and the emitter the only consumer, so ordering is the order in
//! which the engine forwards them.

use crate::config::CoordinatorConfig;
use crate::decision::LlmDecisionService;
use crate::registry::CapabilityRegistry;
use crate::routing::{KeywordTable, RoutingDecision};
use crate::triage::Router;
use conduit_common::{
    Capability, CapabilityName, ConduitError, GraphState, NodeUpdate, Request, RequestSession,
    Result, SessionState, StreamEvent,
};
use conduit_llm::build_llm_client;
use conduit_memory::MeetingStore;
use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

/// Node name for updates the engine emits on its own behalf.
pub const SUPERVISOR_NODE: &str = "supervisor";

/// User-safe text substituted for an internal failure.
pub fn degraded_message(capability: Option<CapabilityName>) -> String {
    let who = capability.map_or("the assistant", CapabilityName::label);
    format!("Sorry, {who} could not complete this request. Please try again.")
}

/// Summary of one finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<RoutingDecision>,
    pub graph: GraphState,
    pub events: u64,
}

/// A running session: its event stream, its cancellation token and the task
/// that will produce its [`SessionReport`].
///
/// Dropping the handle cancels the session.
pub struct SessionHandle {
    session_id: String,
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    cancel_on_drop: DropGuard,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event, or `None` once the session has ended.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for the session task and return its report.
    ///
    /// The session stays cancellable while waiting: dropping this future
    /// cancels it.
    pub async fn join(self) -> Result<SessionReport> {
        let Self {
            events,
            cancel_on_drop,
            task,
            ..
        } = self;
        drop(events);
        let report = task
            .await
            .map_err(|e| ConduitError::CapabilityFault(format!("Session task failed: {e}")));
        drop(cancel_on_drop.disarm());
        report
    }

    /// Take the pieces apart. The caller becomes responsible for cancelling
    /// the session when it stops consuming events.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<StreamEvent>,
        CancellationToken,
        JoinHandle<SessionReport>,
    ) {
        let Self {
            events,
            cancel_on_drop,
            task,
            ..
        } = self;
        (events, cancel_on_drop.disarm(), task)
    }
}

/// Drives sessions. Cheap to clone; clones share the router and registry.
#[derive(Clone)]
pub struct ExecutionEngine {
    router: Arc<Router>,
    registry: Arc<CapabilityRegistry>,
}

impl ExecutionEngine {
    pub fn new(router: Router, registry: CapabilityRegistry) -> Self {
        Self {
            router: Arc::new(router),
            registry: Arc::new(registry),
        }
    }

    /// Wire the standard capabilities, the keyword table and, when an LLM is
    /// configured, the decision service.
    pub fn from_config(config: &CoordinatorConfig, store: Arc<MeetingStore>) -> Result<Self> {
        let llm = config.llm.as_ref().map(build_llm_client).transpose()?;
        let registry = CapabilityRegistry::standard(config, store, llm)?;

        let mut table = KeywordTable::standard();
        table.retain(|name| registry.contains(name));
        let mut router = Router::new(table, Some(CapabilityName::WebAgent))
            .with_catalog(registry.catalog());

        if config.decision_enabled() {
            if let Some(llm_config) = config.decision_llm() {
                let client = build_llm_client(&llm_config)?;
                let prompt = config.agent_settings(crate::config::SUPERVISOR_KEY).system_prompt;
                router = router.with_decision_service(
                    Arc::new(LlmDecisionService::new(client, prompt)),
                    config.decision.timeout(),
                );
            }
        } else {
            info!("Decision service disabled, using keyword routing");
        }

        Ok(Self::new(router, registry))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Start a session on its own task.
    ///
    /// Cancelling `cancel`, or dropping the returned handle, stops the
    /// session at its next suspension point.
    pub fn spawn(&self, request: Request, cancel: CancellationToken) -> SessionHandle {
        let (tx, events) = mpsc::channel(1);
        let session_id = request.id().to_string();
        let engine = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { engine.execute(request, token, tx).await });

        SessionHandle {
            session_id,
            events,
            cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    /// Run a session to the end, discarding the live events. Dropping the
    /// returned future cancels the session.
    pub async fn run(&self, request: Request) -> Result<SessionReport> {
        let mut handle = self.spawn(request, CancellationToken::new());
        while handle.recv().await.is_some() {}
        handle.join().await
    }

    /// Drive one session, sending each event to `events` as it is produced.
    pub async fn execute(
        &self,
        request: Request,
        cancel: CancellationToken,
        events: mpsc::Sender<StreamEvent>,
    ) -> SessionReport {
        let mut run = SessionRun::new(request.id(), cancel.clone(), events);
        let (session, mut progress) = RequestSession::new(request, cancel.clone());

        run.transition(SessionState::Routing);
        let decision = match self.router.route(&session).await {
            Ok(decision) => decision,
            Err(ConduitError::SessionCancelled) => return run.cancelled(),
            Err(e) => {
                error!(session_id = %run.session_id, error = %e, "Routing failed");
                return run.degrade(SUPERVISOR_NODE, None).await;
            }
        };
        run.decision = Some(decision.clone());

        let capability = match self.registry.get(decision.capability) {
            Ok(capability) => capability,
            Err(e) => {
                error!(
                    session_id = %run.session_id,
                    capability = %decision.capability,
                    error = %e,
                    "Routing and registration tables disagree"
                );
                return run.degrade(SUPERVISOR_NODE, Some(decision.capability)).await;
            }
        };

        run.transition(SessionState::Executing);
        let node = decision.capability.as_str();
        let outcome = {
            let work = AssertUnwindSafe(capability.run(&session)).catch_unwind();
            tokio::pin!(work);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Err(ConduitError::SessionCancelled),
                    Some(update) = progress.recv() => {
                        if run.emit(node, update).await.is_err() {
                            break Err(ConduitError::SessionCancelled);
                        }
                    }
                    result = &mut work => {
                        break result.unwrap_or_else(|_| {
                            Err(ConduitError::CapabilityFault("capability panicked".into()))
                        });
                    }
                }
            }
        };

        if outcome.as_ref().is_err_and(ConduitError::is_cancelled) {
            return run.cancelled();
        }

        // Progress sent in the same poll that finished the capability.
        while let Ok(update) = progress.try_recv() {
            if run.emit(node, update).await.is_err() {
                return run.cancelled();
            }
        }

        match outcome {
            Ok(update) => {
                if run.emit(node, update).await.is_err() {
                    return run.cancelled();
                }
                run.finish(SessionState::Completed)
            }
            Err(e) => {
                error!(
                    session_id = %run.session_id,
                    capability = %decision.capability,
                    error = %e,
                    "Capability failed"
                );
                run.degrade(node, Some(decision.capability)).await
            }
        }
    }
}

/// Mutable bookkeeping for one session. Never shared.
struct SessionRun {
    session_id: String,
    state: SessionState,
    decision: Option<RoutingDecision>,
    graph: GraphState,
    seq: u64,
    cancel: CancellationToken,
    events: mpsc::Sender<StreamEvent>,
}

impl SessionRun {
    fn new(session_id: &str, cancel: CancellationToken, events: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: SessionState::Created,
            decision: None,
            graph: GraphState::new(),
            seq: 0,
            cancel,
            events,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session_id = %self.session_id, from = %self.state, to = %next, "Session transition");
        self.state = next;
    }

    /// Hand one event to the consumer. Only delivered events are recorded.
    async fn emit(&mut self, node: &str, update: NodeUpdate) -> Result<()> {
        let event = StreamEvent::new(self.seq, node, update);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ConduitError::SessionCancelled),
            sent = self.events.send(event.clone()) => {
                sent.map_err(|_| ConduitError::SessionCancelled)?;
            }
        }
        self.graph.record(&event);
        self.seq += 1;
        Ok(())
    }

    /// Emit one degraded update and end the session as failed.
    async fn degrade(mut self, node: &str, capability: Option<CapabilityName>) -> SessionReport {
        if self
            .emit(node, NodeUpdate::text(degraded_message(capability)))
            .await
            .is_err()
        {
            return self.cancelled();
        }
        self.finish(SessionState::Failed)
    }

    fn cancelled(self) -> SessionReport {
        self.cancel.cancel();
        info!(session_id = %self.session_id, events = self.seq, "Session cancelled");
        self.finish(SessionState::Cancelled)
    }

    fn finish(mut self, state: SessionState) -> SessionReport {
        self.transition(state);
        if state == SessionState::Completed {
            info!(
                session_id = %self.session_id,
                state = %state,
                events = self.seq,
                "Session finished"
            );
        } else if state == SessionState::Failed {
            warn!(session_id = %self.session_id, state = %state, "Session finished degraded");
        }
        SessionReport {
            session_id: self.session_id,
            state,
            decision: self.decision,
            graph: self.graph,
            events: self.seq,
        }
    }
}
