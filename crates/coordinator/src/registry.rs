//! The capability registration table.

use crate::config::CoordinatorConfig;
use crate::decision::CatalogEntry;
use conduit_agents::{MeetingsAgent, RagAgent, WeatherAgent, WebAgent};
use conduit_common::{Capability, CapabilityName, ConduitError, Result};
use conduit_llm::LlmClient;
use conduit_memory::MeetingStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Maps each capability name to its handler. Built once at startup.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    capabilities: HashMap<CapabilityName, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in capabilities wired from configuration.
    pub fn standard(
        config: &CoordinatorConfig,
        store: Arc<MeetingStore>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self> {
        let settings = |name: CapabilityName| config.agent_settings(name.as_str());

        let mut registry = Self::new();
        registry.register(Arc::new(WeatherAgent::from_config(
            &config.weather,
            llm.clone(),
            &settings(CapabilityName::WeatherAgent),
        )?));
        registry.register(Arc::new(MeetingsAgent::from_config(
            store,
            llm.clone(),
            &settings(CapabilityName::MeetingsAgent),
        )));
        registry.register(Arc::new(RagAgent::from_config(
            llm.clone(),
            &settings(CapabilityName::RagAgent),
        )));
        registry.register(Arc::new(WebAgent::from_config(
            &config.web,
            llm,
            &settings(CapabilityName::WebAgent),
        )?));

        info!(capabilities = registry.len(), "Capability registry built");
        Ok(registry)
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name();
        if self.capabilities.insert(name, capability).is_some() {
            warn!(capability = %name, "Replaced an already registered capability");
        }
    }

    /// Look up a handler. A miss means the routing and registration tables
    /// disagree.
    pub fn get(&self, name: CapabilityName) -> Result<Arc<dyn Capability>> {
        self.capabilities
            .get(&name)
            .cloned()
            .ok_or_else(|| ConduitError::UnknownCapability(name.to_string()))
    }

    pub fn contains(&self, name: CapabilityName) -> bool {
        self.capabilities.contains_key(&name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<CapabilityName> {
        CapabilityName::ALL
            .into_iter()
            .filter(|name| self.contains(*name))
            .collect()
    }

    /// Names and descriptions offered to the decision service.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                self.capabilities
                    .get(&name)
                    .map(|c| CatalogEntry::new(name, c.description()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
