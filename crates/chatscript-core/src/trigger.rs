//! Trigger catalog
//!
//! The set of trigger types a host can dispatch is configuration, not code.
//! A [`TriggerCatalog`] holds one [`TriggerSpec`] per type and resolves the
//! names scripts pass to `register`.

use crate::error::{PreludeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Description of a single trigger type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Canonical name, e.g. `chat` or `worldLoad`
    pub name: String,
    /// Alternative names accepted by `register`
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Whether handlers may cancel events of this type
    #[serde(default)]
    pub cancelable: bool,
    /// Payload fields every event of this type carries
    #[serde(default)]
    pub payload: Vec<String>,
    /// Payload field that criteria are matched against
    #[serde(default)]
    pub subject: Option<String>,
}

impl TriggerSpec {
    /// Create a non-cancelable trigger type without payload
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            cancelable: false,
            payload: Vec::new(),
            subject: None,
        }
    }

    pub fn cancelable(mut self) -> Self {
        self.cancelable = true;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_payload(mut self, fields: &[&str]) -> Self {
        self.payload = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Set the subject field; it is added to the payload if missing
    pub fn with_subject(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.payload.contains(&field) {
            self.payload.push(field.clone());
        }
        self.subject = Some(field);
        self
    }

    /// Whether criteria can be attached to registrations of this type
    pub fn supports_criteria(&self) -> bool {
        self.subject.is_some()
    }
}

/// Lookup table of the trigger types known to a host
#[derive(Debug, Clone)]
pub struct TriggerCatalog {
    specs: Vec<TriggerSpec>,
    index: HashMap<String, usize>,
}

impl TriggerCatalog {
    /// Build a catalog, rejecting empty or colliding names
    pub fn new(specs: Vec<TriggerSpec>) -> Result<Self> {
        let mut index = HashMap::new();

        for (i, spec) in specs.iter().enumerate() {
            if let Some(field) = &spec.subject {
                if !spec.payload.contains(field) {
                    return Err(PreludeError::InvalidCatalog(format!(
                        "subject '{}' of trigger '{}' is not a payload field",
                        field, spec.name
                    )));
                }
            }

            for name in std::iter::once(&spec.name).chain(spec.aliases.iter()) {
                let key = normalize(name);
                if key.is_empty() {
                    return Err(PreludeError::InvalidCatalog(
                        "trigger names must not be empty".into(),
                    ));
                }
                if index.insert(key, i).is_some() {
                    return Err(PreludeError::InvalidCatalog(format!(
                        "trigger name '{}' is defined more than once",
                        name
                    )));
                }
            }
        }

        Ok(Self { specs, index })
    }

    /// The default vocabulary of a game client host
    pub fn standard() -> Self {
        let specs = vec![
            TriggerSpec::new("chat").cancelable().with_subject("message"),
            TriggerSpec::new("tick").with_payload(&["ticks"]),
            TriggerSpec::new("step").with_payload(&["steps"]),
            TriggerSpec::new("worldLoad"),
            TriggerSpec::new("worldUnload"),
            TriggerSpec::new("renderWorld").with_payload(&["partialTicks"]),
            TriggerSpec::new("renderOverlay")
                .cancelable()
                .with_alias("overlay"),
            TriggerSpec::new("postRenderOverlay"),
            TriggerSpec::new("keyPress").with_payload(&["key"]),
            TriggerSpec::new("soundPlay")
                .cancelable()
                .with_payload(&["volume", "pitch"])
                .with_subject("name"),
            TriggerSpec::new("itemTooltip")
                .cancelable()
                .with_payload(&["item", "lore"]),
            TriggerSpec::new("guiOpened").cancelable().with_payload(&["gui"]),
            TriggerSpec::new("guiClosed").with_payload(&["gui"]),
            TriggerSpec::new("guiRender").with_payload(&["mouseX", "mouseY", "gui"]),
            TriggerSpec::new("entityDeath").with_payload(&["entity"]),
            TriggerSpec::new("command")
                .with_alias("cmd")
                .with_payload(&["args"])
                .with_subject("name"),
        ];

        let mut index = HashMap::new();
        for (i, spec) in specs.iter().enumerate() {
            for name in std::iter::once(&spec.name).chain(spec.aliases.iter()) {
                index.insert(normalize(name), i);
            }
        }

        Self { specs, index }
    }

    /// Resolve a trigger name or alias, ignoring case
    pub fn resolve(&self, name: &str) -> Result<&TriggerSpec> {
        self.index
            .get(&normalize(name))
            .map(|&i| &self.specs[i])
            .ok_or_else(|| PreludeError::UnknownTriggerType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&normalize(name))
    }

    /// Iterate over trigger types in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &TriggerSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for TriggerCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let catalog = TriggerCatalog::standard();
        assert_eq!(catalog.resolve("WorldLoad").map(|s| s.name.as_str()), Ok("worldLoad"));
        assert_eq!(catalog.resolve("worldload").map(|s| s.name.as_str()), Ok("worldLoad"));
    }

    #[test]
    fn test_resolve_alias() {
        let catalog = TriggerCatalog::standard();
        assert_eq!(catalog.resolve("cmd").map(|s| s.name.as_str()), Ok("command"));
    }

    #[test]
    fn test_unknown_trigger() {
        let catalog = TriggerCatalog::standard();
        assert_eq!(
            catalog.resolve("teleport").map(|s| s.name.clone()),
            Err(PreludeError::UnknownTriggerType("teleport".into()))
        );
    }

    #[test]
    fn test_standard_catalog_is_consistent() {
        let catalog = TriggerCatalog::standard();
        let rebuilt = TriggerCatalog::new(catalog.iter().cloned().collect());
        assert!(rebuilt.is_ok());
        assert!(catalog.resolve("chat").is_ok_and(|s| s.cancelable && s.supports_criteria()));
        assert!(catalog.resolve("tick").is_ok_and(|s| !s.cancelable));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let specs = vec![
            TriggerSpec::new("chat"),
            TriggerSpec::new("message").with_alias("Chat"),
        ];
        assert!(matches!(
            TriggerCatalog::new(specs),
            Err(PreludeError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_subject_must_be_payload_field() {
        let mut spec = TriggerSpec::new("chat");
        spec.subject = Some("message".into());
        assert!(TriggerCatalog::new(vec![spec]).is_err());
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: TriggerSpec = serde_json::from_str(r#"{ "name": "tick" }"#).unwrap();
        assert_eq!(spec, TriggerSpec::new("tick"));
    }
}
