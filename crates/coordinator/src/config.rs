//! Configuration for the coordinator.
//!
//! Loaded from a TOML file; every section has defaults so an empty file (or
//! no file at all) yields a working keyword-only setup.
//!
//! # File permissions
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-writable files
//! - Rejects world-readable files containing API keys

use conduit_agents::{AgentSettings, WeatherConfig, WebSearchConfig};
use conduit_common::CapabilityName;
use conduit_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Key under `[agents]` holding the decision service's settings.
pub const SUPERVISOR_KEY: &str = "supervisor";

/// Main coordinator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Chat-completion provider. Without it, routing is keyword-only and
    /// capabilities answer deterministically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    /// Decision service settings
    pub decision: DecisionConfig,

    /// Per-capability settings keyed by node name (`weather_agent`, ...)
    /// plus `supervisor` for the decision service
    pub agents: BTreeMap<String, AgentSettings>,

    /// Search backend for `web_agent`
    pub web: WebSearchConfig,

    /// Forecast backend for `weather_agent`
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Consult the decision service when an LLM is configured
    pub enabled: bool,

    /// Upper bound on one decision-service call
    pub timeout_ms: u64,

    /// Model override for routing (defaults to `[llm].model`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5000,
            model: None,
        }
    }
}

impl DecisionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix systems, this validates that:
    /// - The file is a regular file
    /// - The file is not world-writable
    /// - The file is not world-readable if it contains an API key
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        if config.llm.as_ref().is_some_and(|llm| llm.api_key.is_some()) {
            warn!(
                "API key found in config file '{}'. For better security, \
                 use the {} environment variable instead.",
                path.display(),
                conduit_llm::config::API_KEY_ENV
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.warn_unknown_agents();
        Ok(config)
    }

    /// Settings for one node name, or the defaults.
    pub fn agent_settings(&self, name: &str) -> AgentSettings {
        self.agents.get(name).cloned().unwrap_or_default()
    }

    /// Whether routing should consult the decision service.
    pub fn decision_enabled(&self) -> bool {
        self.decision.enabled && self.llm.is_some()
    }

    /// LLM settings for the decision service, with the model override applied.
    pub fn decision_llm(&self) -> Option<LlmConfig> {
        let mut llm = self.llm.clone()?;
        if let Some(model) = &self.decision.model {
            llm.model = model.clone();
        }
        Some(llm)
    }

    fn warn_unknown_agents(&self) {
        for key in self.agents.keys() {
            if key != SUPERVISOR_KEY && key.parse::<CapabilityName>().is_err() {
                warn!(agent = %key, "Ignoring settings for unknown capability");
            }
        }
    }
}

/// Validate config file permissions on Unix systems.
///
/// Requirements:
/// - File must be a regular file (not a directory, device, ...)
/// - File must not be world-writable (mode & 0o002 == 0)
/// - If the file contains an API key, it must not be world-readable
#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!("Config path '{}' is not a regular file.", path.display());
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    let has_api_key = content
        .lines()
        .map(str::trim_start)
        .any(|line| line.starts_with("api_key") && line.contains('='));

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CoordinatorConfig::from_toml("").unwrap();
        assert!(config.llm.is_none());
        assert!(config.decision.enabled);
        assert_eq!(config.decision.timeout_ms, 5000);
        assert_eq!(config.web.max_results, 3);
        assert!(!config.decision_enabled());
    }

    #[test]
    fn test_sections_parse() {
        let config = CoordinatorConfig::from_toml(
            r#"
            [llm]
            model = "gpt-4o"

            [decision]
            timeout_ms = 1500
            model = "gpt-4o-mini"

            [agents.rag_agent]
            system_prompt = "Answer from the document only."

            [agents.supervisor]
            system_prompt = "Pick one."

            [web]
            max_results = 5
            "#,
        )
        .unwrap();

        assert!(config.decision_enabled());
        assert_eq!(config.decision.timeout(), Duration::from_millis(1500));
        assert_eq!(config.decision_llm().unwrap().model, "gpt-4o-mini");
        assert_eq!(config.llm.as_ref().unwrap().model, "gpt-4o");
        assert_eq!(
            config.agent_settings("rag_agent").system_prompt.as_deref(),
            Some("Answer from the document only.")
        );
        assert!(config.agent_settings("web_agent").system_prompt.is_none());
        assert_eq!(config.web.max_results, 5);
    }

    #[test]
    fn test_decision_can_be_disabled() {
        let config = CoordinatorConfig::from_toml("[llm]\n[decision]\nenabled = false\n").unwrap();
        assert!(!config.decision_enabled());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_world_writable_file() {
        use std::os::unix::fs::PermissionsExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[web]\nmax_results = 2\n").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o666)).unwrap();

        assert!(CoordinatorConfig::from_file(file.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_world_readable_api_key() {
        use std::os::unix::fs::PermissionsExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[llm]\napi_key = \"sk-test\"\n").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = CoordinatorConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("world-readable"));

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        let config = CoordinatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.llm.unwrap().api_key.as_deref(), Some("sk-test"));
    }

    #[cfg(unix)]
    #[test]
    fn test_loads_private_file() {
        use std::os::unix::fs::PermissionsExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[weather]\ntimeout_ms = 2000\n").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        let config = CoordinatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.weather.timeout_ms, 2000);
    }
}
