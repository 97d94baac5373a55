//! Host configuration
//!
//! Loaded from `{config_dir}/chatscript/config.json` unless a path is given.
//! Every key is optional:
//!
//! ```json
//! {
//!   "triggers": [{ "name": "chat", "cancelable": true, "payload": ["message"], "subject": "message" }],
//!   "cancel_policy": "StopOnCancel",
//!   "console": "Tracing",
//!   "default_jump": 0.5,
//!   "bindings": { "Client": { "name": "demo" } },
//!   "aliases": { "Game": "Client" }
//! }
//! ```

use crate::console::ConsoleTarget;
use crate::dispatch::CancelPolicy;
use crate::easing::DEFAULT_JUMP;
use crate::error::PreludeError;
use crate::trigger::{TriggerCatalog, TriggerSpec};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings a host passes to the prelude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreludeConfig {
    /// Trigger vocabulary; empty means [`TriggerCatalog::standard`]
    pub triggers: Vec<TriggerSpec>,
    /// Whether canceling an event stops the handler chain
    pub cancel_policy: CancelPolicy,
    /// Where `print` output goes
    pub console: ConsoleTarget,
    /// Snap threshold for `easeOut` calls without a `jump` argument
    pub default_jump: f64,
    /// Host values exposed to scripts under `host::`
    pub bindings: BTreeMap<String, Value>,
    /// Extra names for existing bindings
    pub aliases: BTreeMap<String, String>,
}

impl Default for PreludeConfig {
    fn default() -> Self {
        Self {
            triggers: Vec::new(),
            cancel_policy: CancelPolicy::default(),
            console: ConsoleTarget::default(),
            default_jump: DEFAULT_JUMP,
            bindings: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }
}

impl PreludeConfig {
    /// Build the trigger catalog this config describes
    pub fn catalog(&self) -> std::result::Result<TriggerCatalog, PreludeError> {
        if self.triggers.is_empty() {
            Ok(TriggerCatalog::standard())
        } else {
            TriggerCatalog::new(self.triggers.clone())
        }
    }

    /// Parse a config from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("Failed to parse config")?;
        config.catalog()?;
        Ok(config)
    }
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatscript").join("config.json"))
}

/// Load a config file, failing if it is missing or invalid
pub fn load_config(path: &Path) -> Result<PreludeConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    PreludeConfig::from_json(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Load the default config file, returning defaults if it doesn't exist or is invalid
pub fn load_default_config() -> PreludeConfig {
    let Some(path) = default_config_path() else {
        return PreludeConfig::default();
    };

    if !path.exists() {
        return PreludeConfig::default();
    }

    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring config file: {:#}", e);
            PreludeConfig::default()
        }
    }
}

/// Save a config file, creating parent directories
pub fn save_config(path: &Path, config: &PreludeConfig) -> Result<()> {
    if !config.default_jump.is_finite() {
        bail!("default_jump must be a finite number");
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, json).context("Failed to write config file")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PreludeConfig::from_json("{}").unwrap();
        assert_eq!(config, PreludeConfig::default());
        assert_eq!(config.default_jump, 1.0);
        assert_eq!(config.catalog().unwrap().len(), TriggerCatalog::standard().len());
    }

    #[test]
    fn test_custom_catalog() {
        let config = PreludeConfig::from_json(
            r#"{
                "triggers": [
                    { "name": "chat", "cancelable": true, "payload": ["message"], "subject": "message" },
                    { "name": "frame" }
                ],
                "cancel_policy": "StopOnCancel",
                "console": "Tracing",
                "default_jump": 0.25
            }"#,
        )
        .unwrap();

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("frame"));
        assert!(!catalog.contains("tick"));
        assert_eq!(config.cancel_policy, CancelPolicy::StopOnCancel);
        assert_eq!(config.console, ConsoleTarget::Tracing);
        assert_eq!(config.default_jump, 0.25);
    }

    #[test]
    fn test_invalid_catalog_rejected() {
        let result = PreludeConfig::from_json(r#"{ "triggers": [{ "name": "a" }, { "name": "A" }] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("chatscript_config_{}", std::process::id()))
            .join("config.json");

        let mut config = PreludeConfig::default();
        config.aliases.insert("Game".into(), "Client".into());
        config
            .bindings
            .insert("Client".into(), serde_json::json!({ "name": "demo" }));

        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);

        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_config(Path::new("/nonexistent/chatscript/config.json")).is_err());
    }
}
