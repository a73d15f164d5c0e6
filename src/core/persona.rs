use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed identity profile that gates which capabilities and routes are available.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Persona {
    pub id: String,
    pub label: String,
    /// Ordered capability names
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Page the persona lands on after selection
    pub route: String,
}

impl Persona {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Raised when a persona id is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPersonaError {
    pub id: String,
    pub available: Vec<String>,
}

impl fmt::Display for UnknownPersonaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Persona '{}' not found. Available personas: {}",
            self.id,
            self.available.join(", ")
        )
    }
}

impl std::error::Error for UnknownPersonaError {}

#[derive(Debug, Deserialize)]
struct BuiltinPersonaConfig {
    personas: Vec<Persona>,
}

/// The process-wide persona registry. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    /// Registry shipped with the binary.
    pub fn builtin() -> Self {
        const CONFIG_CONTENT: &str = include_str!("../builtins/personas.toml");
        let config: BuiltinPersonaConfig =
            toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtins/personas.toml");
        Self::with_personas(config.personas)
    }

    pub fn with_personas(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    pub fn list(&self) -> &[Persona] {
        &self.personas
    }

    pub fn find(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    /// Look up `id`, failing with the list of known ids.
    pub fn resolve(&self, id: &str) -> Result<&Persona, UnknownPersonaError> {
        self.find(id).ok_or_else(|| UnknownPersonaError {
            id: id.to_string(),
            available: self.ids(),
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.personas.iter().map(|p| p.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_backend_agents() {
        let registry = PersonaRegistry::builtin();
        assert_eq!(
            registry.ids(),
            vec!["assessment", "migration", "testing", "pmo", "integration"]
        );
        let pmo = registry.find("pmo").expect("pmo persona");
        assert_eq!(pmo.route, "/pmo");
        assert!(pmo.has_capability("reports"));
        assert!(!pmo.has_capability("approve"));
    }

    #[test]
    fn capabilities_keep_declared_order() {
        let registry = PersonaRegistry::builtin();
        let assessment = registry.find("assessment").unwrap();
        assert_eq!(assessment.capabilities.first().map(String::as_str), Some("scan"));
        assert_eq!(assessment.capabilities.last().map(String::as_str), Some("chat"));
    }

    #[test]
    fn resolve_unknown_lists_available_ids() {
        let registry = PersonaRegistry::builtin();
        let err = registry.resolve("ceo").unwrap_err();
        assert_eq!(err.id, "ceo");
        assert_eq!(err.available.len(), 5);
        assert!(err.to_string().starts_with("Persona 'ceo' not found"));
    }
}
