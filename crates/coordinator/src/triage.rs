//! The router: decision service first, keyword table second, default last.

use crate::decision::{resolve_answer, validate_input_content, CatalogEntry, DecisionService};
use crate::routing::{KeywordTable, RouterStats, RouterStatsSnapshot, RoutingDecision};
use conduit_common::{CapabilityName, ConduitError, RequestSession, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on one decision-service call.
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Decides which capability handles a request.
///
/// Routing is a pure function of the request, the keyword table and the
/// optional decision service's answer. Decision-service failures are counted
/// and logged, never surfaced.
pub struct Router {
    table: KeywordTable,
    default: Option<CapabilityName>,
    catalog: Vec<CatalogEntry>,
    decision: Option<Arc<dyn DecisionService>>,
    decision_timeout: Duration,
    stats: RouterStats,
}

impl Router {
    /// A keyword-only router.
    ///
    /// Without a catalog, every capability in `table` counts as registered
    /// for the decision service.
    pub fn new(table: KeywordTable, default: Option<CapabilityName>) -> Self {
        let catalog = table
            .capabilities()
            .map(|name| CatalogEntry::new(name, name.label()))
            .collect();
        Self {
            table,
            default,
            catalog,
            decision: None,
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
            stats: RouterStats::default(),
        }
    }

    /// Capabilities (with descriptions) the decision service may choose from.
    pub fn with_catalog(mut self, catalog: Vec<CatalogEntry>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_decision_service(
        mut self,
        service: Arc<dyn DecisionService>,
        timeout: Duration,
    ) -> Self {
        info!(timeout_ms = timeout.as_millis() as u64, "Decision service enabled");
        self.decision = Some(service);
        self.decision_timeout = timeout;
        self
    }

    pub fn has_decision_service(&self) -> bool {
        self.decision.is_some()
    }

    pub fn default_capability(&self) -> Option<CapabilityName> {
        self.default
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Route one request.
    ///
    /// Fails only with [`ConduitError::SessionCancelled`] or, when no default
    /// capability is configured and nothing matched,
    /// [`ConduitError::NoCapabilityMatched`].
    pub async fn route(&self, session: &RequestSession) -> Result<RoutingDecision> {
        debug!(
            session_id = %session.id(),
            preview = %session.request().preview(),
            using_decision_service = self.decision.is_some(),
            "Routing request"
        );

        if let Some(service) = &self.decision {
            match self.consult(service.as_ref(), session).await {
                Ok(decision) => {
                    self.stats.record(decision.mode);
                    info!(
                        session_id = %session.id(),
                        capability = %decision.capability,
                        mode = %decision.mode,
                        "Routing decision made"
                    );
                    return Ok(decision);
                }
                Err(ConduitError::SessionCancelled) => return Err(ConduitError::SessionCancelled),
                Err(e) => {
                    self.stats.record_degraded();
                    warn!(
                        session_id = %session.id(),
                        error = %e,
                        "Decision service degraded, falling back to keyword routing"
                    );
                }
            }
        }

        let decision = self.keyword_route(session.request().message())?;
        self.stats.record(decision.mode);
        info!(
            session_id = %session.id(),
            capability = %decision.capability,
            mode = %decision.mode,
            "Routing decision made"
        );
        Ok(decision)
    }

    /// Deterministic routing: first matching row of the table, else the
    /// default capability.
    pub fn keyword_route(&self, text: &str) -> Result<RoutingDecision> {
        if let Some((capability, trigger)) = self.table.lookup(text) {
            return Ok(RoutingDecision::keyword(capability, &trigger));
        }
        self.default
            .map(RoutingDecision::fallback)
            .ok_or(ConduitError::NoCapabilityMatched)
    }

    async fn consult(
        &self,
        service: &dyn DecisionService,
        session: &RequestSession,
    ) -> Result<RoutingDecision> {
        let text = session.request().message();
        validate_input_content(text)?;

        let call = tokio::time::timeout(self.decision_timeout, service.decide(text, &self.catalog));
        let answer = match session.bounded(call).await? {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => return Err(ConduitError::RoutingDegraded(e.to_string())),
            Err(_) => {
                return Err(ConduitError::RoutingDegraded(format!(
                    "Decision service timed out after {}ms",
                    self.decision_timeout.as_millis()
                )))
            }
        };

        let capability = resolve_answer(&answer, &self.catalog)?;
        Ok(RoutingDecision::decision_service(capability, capability.as_str()))
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(KeywordTable::standard(), Some(CapabilityName::WebAgent))
    }
}
