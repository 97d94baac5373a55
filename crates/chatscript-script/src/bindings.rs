//! Host capability bindings
//!
//! A host exposes its own objects to scripts through a [`HostBindings`]
//! table: stable names mapped to values, plus aliases for renamed entries.
//! The table is validated once when the engine is built and installed as the
//! `host` module, so scripts read `host::Client` or `host::RenderLib`.

use chatscript_core::PreludeError;
use chatscript_core::config::PreludeConfig;
use rhai::{Dynamic, Module};
use std::any::Any;
use std::collections::BTreeMap;

/// Name of the module bindings are installed under
pub const HOST_MODULE: &str = "host";

const RESERVED: &[&str] = &[
    "as", "break", "catch", "const", "continue", "do", "else", "export", "false", "fn", "for",
    "global", "if", "import", "in", "let", "loop", "private", "return", "switch", "this", "throw",
    "true", "try", "until", "while",
];

#[derive(Debug, Clone)]
enum Binding {
    Value(Dynamic),
    Alias { target: String, deprecated: bool },
}

/// Typed table of named host capabilities
#[derive(Debug, Clone, Default)]
pub struct HostBindings {
    entries: BTreeMap<String, Binding>,
}

impl HostBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings and aliases declared in a config file
    pub fn from_config(config: &PreludeConfig) -> Result<Self, PreludeError> {
        let mut bindings = Self::new();
        for (name, value) in &config.bindings {
            bindings.bind_json(name, value)?;
        }
        for (name, target) in &config.aliases {
            bindings.alias(name, target);
        }
        bindings.validate()?;
        Ok(bindings)
    }

    /// Bind a Rust value under `name`, replacing any previous entry
    pub fn bind<T: Any + Clone + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        value: T,
    ) -> &mut Self {
        self.entries
            .insert(name.into(), Binding::Value(Dynamic::from(value)));
        self
    }

    /// Bind a JSON value, converted to the matching script value
    pub fn bind_json(
        &mut self,
        name: impl Into<String>,
        value: &serde_json::Value,
    ) -> Result<&mut Self, PreludeError> {
        let name = name.into();
        let value = rhai::serde::to_dynamic(value).map_err(|e| PreludeError::InvalidBinding {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        self.entries.insert(name, Binding::Value(value));
        Ok(self)
    }

    /// Make `name` refer to the same value as `target`
    pub fn alias(&mut self, name: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.entries.insert(
            name.into(),
            Binding::Alias {
                target: target.into(),
                deprecated: false,
            },
        );
        self
    }

    /// Like [`alias`](Self::alias), but flagged as kept for old scripts
    pub fn deprecated_alias(
        &mut self,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> &mut Self {
        self.entries.insert(
            name.into(),
            Binding::Alias {
                target: target.into(),
                deprecated: true,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Binding names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Value bound to `name`, following aliases
    pub fn resolve(&self, name: &str) -> Option<Dynamic> {
        let mut current = name;
        // An alias chain longer than the table is a cycle
        for _ in 0..=self.entries.len() {
            match self.entries.get(current)? {
                Binding::Value(value) => return Some(value.clone()),
                Binding::Alias { target, .. } => current = target,
            }
        }
        None
    }

    /// Check names and alias targets
    pub fn validate(&self) -> Result<(), PreludeError> {
        for (name, binding) in &self.entries {
            if let Some(reason) = invalid_identifier(name) {
                return Err(PreludeError::InvalidBinding {
                    name: name.clone(),
                    reason,
                });
            }
            if let Binding::Alias { target, .. } = binding {
                if self.resolve(name).is_none() {
                    return Err(PreludeError::InvalidBinding {
                        name: name.clone(),
                        reason: format!("alias target '{}' does not resolve to a value", target),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build the `host` module after validating the table
    ///
    /// Deprecated aliases are still installed, with a warning naming the
    /// binding to use instead.
    pub fn to_module(&self) -> Result<Module, PreludeError> {
        self.validate()?;

        for (name, target) in self.deprecated() {
            tracing::warn!("host::{} is deprecated, use host::{}", name, target);
        }

        let mut module = Module::new();
        for name in self.entries.keys() {
            if let Some(value) = self.resolve(name) {
                module.set_var(name.as_str(), value);
            }
        }
        Ok(module)
    }

    /// Deprecated aliases and the names they point to
    pub fn deprecated(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(name, binding)| match binding {
            Binding::Alias {
                target,
                deprecated: true,
            } => Some((name.as_str(), target.as_str())),
            _ => None,
        })
    }
}

fn invalid_identifier(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Some("name is empty".into());
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Some("name must start with a letter or '_'".into());
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Some("name may only contain letters, digits and '_'".into());
    }
    if RESERVED.contains(&name) {
        return Some("name is a reserved keyword".into());
    }
    None
}
