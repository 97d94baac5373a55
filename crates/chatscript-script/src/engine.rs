//! Script engine that loads scripts and fires events into their handlers

use crate::capabilities::HostCapabilities;
use crate::prelude_api::{HandlerRef, ScriptEvent, register_prelude_api};
use anyhow::{Result, anyhow};
use chatscript_core::PreludeError;
use chatscript_core::dispatch::RegistrationId;
use chatscript_core::event::{Event, Payload};
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while loading scripts
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The script does not parse
    #[error("Failed to compile {name}: {message}")]
    Compile { name: String, message: String },

    /// The script's top-level code failed
    #[error("Error in script {name}: {message}")]
    Runtime { name: String, message: String },
}

/// Where a loaded script came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    File(PathBuf),
    Inline(String),
}

/// A script that is currently loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScript {
    pub name: String,
    pub origin: ScriptOrigin,
}

/// A handler that raised an error while handling an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler: String,
    pub message: String,
}

/// Result of firing one event
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    /// Canonical trigger name
    pub trigger: String,
    /// Handlers invoked, including failed ones
    pub invoked: usize,
    /// Handlers skipped after a cancel
    pub skipped: usize,
    /// Whether a handler canceled the event
    pub canceled: bool,
    /// Handlers that raised errors
    pub failures: Vec<HandlerFailure>,
    /// Final state of the event
    pub event: Event,
}

impl DispatchReport {
    /// True when no handler failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Checkpoint {
    mark: RegistrationId,
    loaded: usize,
    scope: usize,
    ast: AST,
}

enum InvokeError {
    Unresolved,
    Script(Box<EvalAltResult>),
}

/// Script engine with the prelude installed
pub struct ScriptEngine {
    engine: Engine,
    caps: HostCapabilities,
    ast: AST,
    scope: Scope<'static>,
    loaded: Vec<LoadedScript>,
}

impl ScriptEngine {
    /// Create an engine bound to the given host capabilities
    pub fn new(caps: HostCapabilities) -> Result<Self> {
        let mut engine = Engine::new();

        register_prelude_api(&mut engine, &caps)?;

        // Configure engine for better errors
        engine.set_max_expr_depths(64, 64);

        Ok(Self {
            engine,
            caps,
            ast: AST::empty(),
            scope: Scope::new(),
            loaded: Vec::new(),
        })
    }

    /// Create an engine with the standard trigger catalog and a stdout console
    pub fn with_defaults() -> Result<Self> {
        Self::new(HostCapabilities::default())
    }

    pub fn capabilities(&self) -> &HostCapabilities {
        &self.caps
    }

    /// Scripts loaded since the last unload, in load order
    pub fn loaded(&self) -> &[LoadedScript] {
        &self.loaded
    }

    /// Load a script from source
    ///
    /// Top-level code runs immediately, so its `register` calls take effect.
    /// If any handler registered by name has no matching function, the
    /// registrations made by this script are rolled back.
    pub fn load(&mut self, name: &str, source: &str) -> Result<()> {
        let checkpoint = self.checkpoint();
        let origin = ScriptOrigin::Inline(source.to_string());

        let result = self
            .load_unchecked(name, source, origin)
            .and_then(|()| self.check_handlers_since(checkpoint.mark));
        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    /// Load a script file
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        self.load_files(&[path.to_path_buf()])
    }

    /// Load several script files
    ///
    /// Handlers are checked once all files ran, so a script may register a
    /// handler defined in a later file. Any failure rolls back the whole
    /// batch.
    pub fn load_files(&mut self, paths: &[PathBuf]) -> Result<()> {
        let checkpoint = self.checkpoint();

        let result = paths
            .iter()
            .try_for_each(|path| self.load_path(path))
            .and_then(|()| self.check_handlers_since(checkpoint.mark));
        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            mark: self.caps.triggers().next_id(),
            loaded: self.loaded.len(),
            scope: self.scope.len(),
            ast: self.ast.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        let dropped = self.caps.triggers().truncate_from(checkpoint.mark);
        self.loaded.truncate(checkpoint.loaded);
        self.scope.rewind(checkpoint.scope);
        self.ast = checkpoint.ast;
        tracing::warn!("Evaluation failed, rolled back {} registration(s)", dropped);
    }

    fn load_path(&mut self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read script file {}: {}", path.display(), e))?;
        let name = path.display().to_string();
        self.load_unchecked(&name, &source, ScriptOrigin::File(path.to_path_buf()))
    }

    fn load_unchecked(&mut self, name: &str, source: &str, origin: ScriptOrigin) -> Result<()> {
        self.eval_source(name, source).map(drop)?;
        self.loaded.push(LoadedScript {
            name: name.to_string(),
            origin,
        });
        tracing::info!(
            "Loaded {} ({} trigger registration(s) total)",
            name,
            self.caps.triggers().len()
        );
        Ok(())
    }

    fn eval_source(&mut self, name: &str, source: &str) -> Result<Dynamic> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| ScriptError::Compile {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &ast)
            .map_err(|e| ScriptError::Runtime {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        // Keep the functions around for later handler calls
        self.ast.combine(ast);
        Ok(value)
    }

    /// Evaluate a snippet in the engine's session, as the REPL does
    ///
    /// Functions it defines stay callable; it is not recorded as a loaded
    /// script, so [`reload`](Self::reload) drops it. A snippet that fails
    /// partway leaves no registrations, functions or variables behind.
    /// Named handlers are resolved when the event fires, so a snippet may
    /// register a function defined by a later one.
    pub fn eval(&mut self, source: &str) -> Result<Dynamic> {
        let checkpoint = self.checkpoint();
        let result = self.eval_source("<input>", source);
        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    /// Compile a script to check for syntax errors without running it
    pub fn compile(&self, source: &str) -> Result<()> {
        self.engine
            .compile(source)
            .map_err(|e| anyhow!("Script compilation failed: {}", e))?;
        Ok(())
    }

    /// Drop every registration, function and variable
    pub fn unload(&mut self) {
        self.caps.triggers().clear();
        self.ast = AST::empty();
        self.scope.clear();
        let count = self.loaded.len();
        self.loaded.clear();
        tracing::info!("Unloaded {} script(s)", count);
    }

    /// Unload, then load the same scripts again from their sources
    pub fn reload(&mut self) -> Result<()> {
        let scripts = std::mem::take(&mut self.loaded);
        self.unload();

        let checkpoint = self.checkpoint();
        let result = scripts
            .iter()
            .try_for_each(|script| match &script.origin {
                ScriptOrigin::File(path) => self.load_path(path),
                ScriptOrigin::Inline(source) => {
                    self.load_unchecked(&script.name, source, script.origin.clone())
                }
            })
            .and_then(|()| self.check_handlers_since(checkpoint.mark));

        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    fn check_handlers_since(&self, mark: RegistrationId) -> Result<()> {
        let mut unresolved = None;
        self.caps
            .triggers()
            .for_each_handler(|id, trigger, handler| {
                if id < mark || unresolved.is_some() {
                    return;
                }
                if handler_arity(&self.ast, handler).is_none() {
                    unresolved = Some(PreludeError::UnresolvedHandler {
                        trigger: trigger.to_string(),
                        handler: handler.name().to_string(),
                    });
                }
            });

        match unresolved {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Fire an event and run every matching handler
    ///
    /// Errors raised by handlers are written to the console and collected in
    /// the report. A handler that cannot be resolved aborts the dispatch with
    /// [`PreludeError::UnresolvedHandler`].
    pub fn fire(&mut self, trigger: &str, payload: Payload) -> Result<DispatchReport> {
        let catalog = std::sync::Arc::clone(self.caps.catalog());
        let spec = catalog.resolve(trigger)?;
        let mut event = ScriptEvent::new(Event::new(spec, payload)?);

        let registry = self.caps.triggers().clone();
        let console = std::sync::Arc::clone(self.caps.console());
        let Self {
            engine, ast, scope, ..
        } = self;

        let mut failures = Vec::new();
        let summary = registry.dispatch(&mut event, |id, handler, event| {
            match invoke(engine, ast, scope, handler, event) {
                Ok(()) => Ok(()),
                Err(InvokeError::Unresolved) => Err(PreludeError::UnresolvedHandler {
                    trigger: spec.name.clone(),
                    handler: handler.name().to_string(),
                }),
                Err(InvokeError::Script(err)) => {
                    let message = err.to_string();
                    tracing::error!(
                        "Handler {} (#{}) failed on {}: {}",
                        handler.name(),
                        id,
                        spec.name,
                        message
                    );
                    console.write_line(&format!(
                        "Error in {} handler {}: {}",
                        spec.name,
                        handler.name(),
                        message
                    ));
                    failures.push(HandlerFailure {
                        handler: handler.name().to_string(),
                        message,
                    });
                    Ok(())
                }
            }
        })?;

        tracing::debug!(
            "Fired {}: {} invoked, {} skipped, canceled={}",
            spec.name,
            summary.invoked,
            summary.skipped,
            summary.canceled
        );

        Ok(DispatchReport {
            trigger: spec.name.clone(),
            invoked: summary.invoked,
            skipped: summary.skipped,
            canceled: summary.canceled,
            failures,
            event: event.snapshot(),
        })
    }

    /// Fire an event whose payload is a JSON object
    pub fn fire_json(&mut self, trigger: &str, payload: Value) -> Result<DispatchReport> {
        match payload {
            Value::Object(map) => self.fire(trigger, map),
            Value::Null => self.fire(trigger, Payload::new()),
            other => Err(anyhow!("Event payload must be a JSON object, got {}", other)),
        }
    }

    /// Fire the `command` trigger for `/name args...`
    pub fn fire_command(&mut self, name: &str, args: &[&str]) -> Result<DispatchReport> {
        let mut payload = Payload::new();
        payload.insert("name".into(), Value::from(name));
        payload.insert(
            "args".into(),
            Value::Array(args.iter().map(|a| Value::from(*a)).collect()),
        );
        self.fire("command", payload)
    }

    /// Variables defined by top-level script code
    pub fn scope(&self) -> &Scope<'static> {
        &self.scope
    }

    /// Get a reference to the underlying Rhai engine
    pub fn inner(&self) -> &Engine {
        &self.engine
    }
}

fn script_arities(ast: &AST, name: &str) -> Vec<usize> {
    ast.iter_functions()
        .filter(|f| f.name == name)
        .map(|f| f.params.len())
        .collect()
}

/// Number of arguments to call a handler with, if it resolves
///
/// A handler takes the event when its target function has one free
/// parameter and nothing when it has none. Values captured by a closure fill
/// the leading parameters.
fn handler_arity(ast: &AST, handler: &HandlerRef) -> Option<usize> {
    let (name, curried) = match handler {
        HandlerRef::Named(name) => (name.as_str(), 0),
        HandlerRef::Pointer(ptr) => (ptr.fn_name(), ptr.curry().len()),
    };

    let free: Vec<usize> = script_arities(ast, name)
        .into_iter()
        .filter_map(|n| n.checked_sub(curried))
        .collect();
    if free.contains(&1) {
        Some(1)
    } else if free.contains(&0) {
        Some(0)
    } else {
        None
    }
}

fn invoke(
    engine: &Engine,
    ast: &AST,
    scope: &mut Scope<'static>,
    handler: &HandlerRef,
    event: &mut ScriptEvent,
) -> Result<(), InvokeError> {
    let Some(arity) = handler_arity(ast, handler) else {
        return Err(InvokeError::Unresolved);
    };
    let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);

    // Resolution is settled above, so every error from here on is the script's
    let result = match (handler, arity) {
        (HandlerRef::Named(name), 1) => {
            engine.call_fn_with_options::<Dynamic>(options, scope, ast, name, (event.clone(),))
        }
        (HandlerRef::Named(name), _) => {
            engine.call_fn_with_options::<Dynamic>(options, scope, ast, name, ())
        }
        (HandlerRef::Pointer(ptr), 1) => ptr.call::<Dynamic>(engine, ast, (event.clone(),)),
        (HandlerRef::Pointer(ptr), _) => ptr.call::<Dynamic>(engine, ast, ()),
    };
    result.map(drop).map_err(InvokeError::Script)
}
