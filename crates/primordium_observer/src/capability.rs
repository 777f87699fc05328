//! Capability-indexed routing table (§4.7).

use serde_json::Value;
use std::collections::HashMap;

/// Routing configuration for one capability: which provider/model answers
/// it, and any endpoint/extra-body overrides layered on top of the
/// router's global defaults.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
    pub endpoint: Option<String>,
    pub extra_body: Option<Value>,
}

impl ModelConfig {
    pub fn local(model: impl Into<String>) -> Self {
        Self { provider: "local".to_string(), model: model.into(), endpoint: None, extra_body: None }
    }
}

/// Per-capability override layered over the router's global base
/// url/api-key/timeout/model/extra-body at invocation time.
#[derive(Debug, Clone, Default)]
pub struct CapabilityOverride {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub model: Option<String>,
    pub extra_body: Option<Value>,
}

/// Well-known capability names the engine invokes. Any string is
/// accepted by the router; these constants exist so callers don't
/// hand-type them.
pub const SPECIES_GENERATION: &str = "species_generation";
pub const NARRATIVE: &str = "narrative";
pub const PLANT_DESCRIPTION_UPDATE: &str = "plant_description_update";

/// The capability -> route table plus per-capability overrides and
/// prompt templates.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    routes: HashMap<String, ModelConfig>,
    prompts: HashMap<String, String>,
    overrides: HashMap<String, CapabilityOverride>,
}

impl CapabilityTable {
    pub fn register(&mut self, capability: impl Into<String>, config: ModelConfig) {
        self.routes.insert(capability.into(), config);
    }

    pub fn resolve(&self, capability: &str) -> Option<&ModelConfig> {
        self.routes.get(capability)
    }

    pub fn set_prompt(&mut self, capability: impl Into<String>, prompt: impl Into<String>) {
        self.prompts.insert(capability.into(), prompt.into());
    }

    pub fn prompt(&self, capability: &str) -> Option<&str> {
        self.prompts.get(capability).map(String::as_str)
    }

    pub fn set_override(&mut self, capability: impl Into<String>, over: CapabilityOverride) {
        self.overrides.insert(capability.into(), over);
    }

    pub fn override_for(&self, capability: &str) -> Option<&CapabilityOverride> {
        self.overrides.get(capability)
    }

    pub fn capabilities(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_resolve_round_trips() {
        let mut table = CapabilityTable::default();
        table.register(SPECIES_GENERATION, ModelConfig { provider: "openai".into(), model: "gpt".into(), endpoint: None, extra_body: None });
        assert_eq!(table.resolve(SPECIES_GENERATION).unwrap().provider, "openai");
    }

    #[test]
    fn unknown_capability_resolves_to_none() {
        let table = CapabilityTable::default();
        assert!(table.resolve("nonexistent").is_none());
    }
}
