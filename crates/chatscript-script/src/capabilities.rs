//! Everything a host hands to the script prelude
//!
//! Scripts do not reach into ambient globals. The host builds a
//! [`HostCapabilities`] value (console, trigger registry, bindings, easing
//! default) and passes it to [`ScriptEngine::new`](crate::ScriptEngine::new).

use crate::bindings::HostBindings;
use crate::prelude_api::HandlerRef;
use chatscript_core::PreludeError;
use chatscript_core::config::PreludeConfig;
use chatscript_core::console::{ConsoleSink, StdoutConsole};
use chatscript_core::dispatch::{CancelPolicy, TriggerRegistry};
use chatscript_core::easing::DEFAULT_JUMP;
use chatscript_core::trigger::TriggerCatalog;
use std::sync::Arc;

/// Host services injected into a script engine
#[derive(Clone)]
pub struct HostCapabilities {
    console: Arc<dyn ConsoleSink>,
    triggers: TriggerRegistry<HandlerRef>,
    bindings: HostBindings,
    default_jump: f64,
}

impl HostCapabilities {
    /// Capabilities with a stdout console and no bindings
    pub fn new(catalog: TriggerCatalog) -> Self {
        Self {
            console: Arc::new(StdoutConsole),
            triggers: TriggerRegistry::new(Arc::new(catalog)),
            bindings: HostBindings::new(),
            default_jump: DEFAULT_JUMP,
        }
    }

    /// Capabilities described by a config file
    pub fn from_config(config: &PreludeConfig) -> Result<Self, PreludeError> {
        let catalog = config.catalog()?;
        let bindings = HostBindings::from_config(config)?;

        Ok(Self::new(catalog)
            .with_console(config.console.build())
            .with_policy(config.cancel_policy)
            .with_bindings(bindings)
            .with_default_jump(config.default_jump))
    }

    pub fn with_console(mut self, console: Arc<dyn ConsoleSink>) -> Self {
        self.console = console;
        self
    }

    pub fn with_policy(mut self, policy: CancelPolicy) -> Self {
        self.triggers = self.triggers.with_policy(policy);
        self
    }

    pub fn with_bindings(mut self, bindings: HostBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_default_jump(mut self, jump: f64) -> Self {
        self.default_jump = jump;
        self
    }

    pub fn console(&self) -> &Arc<dyn ConsoleSink> {
        &self.console
    }

    pub fn triggers(&self) -> &TriggerRegistry<HandlerRef> {
        &self.triggers
    }

    pub fn catalog(&self) -> &Arc<TriggerCatalog> {
        self.triggers.catalog()
    }

    pub fn bindings(&self) -> &HostBindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut HostBindings {
        &mut self.bindings
    }

    pub fn default_jump(&self) -> f64 {
        self.default_jump
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::new(TriggerCatalog::standard())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chatscript_core::console::ConsoleTarget;

    #[test]
    fn test_from_config() {
        let config = PreludeConfig {
            cancel_policy: CancelPolicy::StopOnCancel,
            console: ConsoleTarget::Tracing,
            default_jump: 0.5,
            ..PreludeConfig::default()
        };

        let caps = HostCapabilities::from_config(&config).unwrap();
        assert_eq!(caps.triggers().policy(), CancelPolicy::StopOnCancel);
        assert_eq!(caps.default_jump(), 0.5);
        assert!(caps.catalog().contains("chat"));
        assert!(caps.bindings().is_empty());
    }

    #[test]
    fn test_clones_share_registry() {
        let caps = HostCapabilities::default();
        let other = caps.clone();
        other
            .triggers()
            .register("tick", HandlerRef::Named("onTick".into()))
            .unwrap();
        assert_eq!(caps.triggers().len(), 1);
    }
}
