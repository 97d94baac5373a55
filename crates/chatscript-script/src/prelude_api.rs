//! Rhai API for the script prelude
//!
//! Installs the functions every script can call:
//!
//! - `print(value)` / `debug(value)`: write to the host console
//! - `register(trigger, handler)`: attach a handler to a trigger type
//! - `cancel(event)`: cancel the event being dispatched
//! - `easeOut(start, finish, speed[, jump])`: one animation step
//!
//! plus the `Event`, `Trigger` and `Priority` types and the `host` module of
//! capability bindings.

use crate::bindings::HOST_MODULE;
use crate::capabilities::HostCapabilities;
use chatscript_core::PreludeError;
use chatscript_core::dispatch::{Criteria, Priority, TriggerHandle};
use chatscript_core::easing::ease_out;
use chatscript_core::event::{Cancelable, Dispatchable, Event, cancel};
use parking_lot::Mutex;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Module, Position};
use std::sync::Arc;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

// ============================================================================
// Handler References
// ============================================================================

/// What a script registered as a handler
#[derive(Debug, Clone)]
pub enum HandlerRef {
    /// Name of a script function, `register("chat", "onChat")`
    Named(String),
    /// Function pointer or closure, `register("chat", |event| ...)`
    Pointer(FnPtr),
}

impl HandlerRef {
    /// Function name the handler resolves to
    pub fn name(&self) -> &str {
        match self {
            HandlerRef::Named(name) => name,
            HandlerRef::Pointer(ptr) => ptr.fn_name(),
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// Event as seen by scripts
///
/// Clones share state, so a cancel inside a handler is visible to the host.
#[derive(Debug, Clone)]
pub struct ScriptEvent {
    inner: Arc<Mutex<Event>>,
}

impl ScriptEvent {
    pub fn new(event: Event) -> Self {
        Self {
            inner: Arc::new(Mutex::new(event)),
        }
    }

    /// Copy of the underlying event
    pub fn snapshot(&self) -> Event {
        self.inner.lock().clone()
    }

    /// Payload field converted to a script value, `()` when absent
    fn field(&self, name: &str) -> ScriptResult<Dynamic> {
        let value = self.inner.lock().get(name).cloned();
        match value {
            Some(value) => rhai::serde::to_dynamic(value),
            None => Ok(Dynamic::UNIT),
        }
    }

    fn payload_map(&self) -> ScriptResult<Dynamic> {
        let payload = self.inner.lock().payload().clone();
        rhai::serde::to_dynamic(payload)
    }
}

impl Cancelable for ScriptEvent {
    fn trigger_name(&self) -> String {
        self.inner.lock().trigger().to_string()
    }

    fn is_cancelable(&self) -> bool {
        self.inner.lock().is_cancelable()
    }

    fn is_canceled(&self) -> bool {
        self.inner.lock().is_canceled()
    }

    fn mark_canceled(&mut self) {
        self.inner.lock().mark_canceled();
    }
}

impl Dispatchable for ScriptEvent {
    fn subject(&self) -> Option<String> {
        self.inner.lock().subject()
    }
}

// ============================================================================
// Trigger Handle
// ============================================================================

/// Registration handle returned by `register`
#[derive(Debug, Clone)]
pub struct ScriptTrigger {
    handle: TriggerHandle<HandlerRef>,
}

impl ScriptTrigger {
    pub fn handle(&self) -> &TriggerHandle<HandlerRef> {
        &self.handle
    }

    fn set_priority(&mut self, priority: Priority) -> ScriptResult<ScriptTrigger> {
        self.handle.set_priority(priority).map_err(script_error)?;
        Ok(self.clone())
    }

    fn set_criteria(&mut self, pattern: &str) -> ScriptResult<ScriptTrigger> {
        self.handle
            .set_criteria(Criteria::parse(pattern))
            .map_err(script_error)?;
        Ok(self.clone())
    }

    fn set_command_name(&mut self, name: &str) -> ScriptResult<ScriptTrigger> {
        if self.handle.trigger() != "command" {
            return Err(script_error(PreludeError::CriteriaUnsupported(
                self.handle.trigger().to_string(),
            )));
        }
        self.handle
            .set_criteria(Criteria::Exact(name.to_string()))
            .map_err(script_error)?;
        Ok(self.clone())
    }
}

impl From<TriggerHandle<HandlerRef>> for ScriptTrigger {
    fn from(handle: TriggerHandle<HandlerRef>) -> Self {
        Self { handle }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Turn a prelude error into a script runtime error
pub fn script_error(err: PreludeError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        err.to_string().into(),
        Position::NONE,
    ))
}

/// Accept both integer and float script values
fn number(value: &Dynamic) -> ScriptResult<f64> {
    if let Ok(f) = value.as_float() {
        return Ok(f);
    }
    if let Ok(i) = value.as_int() {
        return Ok(i as f64);
    }
    Err(Box::new(EvalAltResult::ErrorMismatchDataType(
        "number".into(),
        value.type_name().into(),
        Position::NONE,
    )))
}

fn priority_module() -> Module {
    let mut module = Module::new();
    for priority in Priority::ALL {
        module.set_var(priority.name(), priority);
    }
    module
}

// ============================================================================
// Registration
// ============================================================================

/// Register the prelude with a Rhai engine
///
/// Fails if the host bindings do not validate.
pub fn register_prelude_api(
    engine: &mut Engine,
    caps: &HostCapabilities,
) -> Result<(), PreludeError> {
    // Console output
    let console = Arc::clone(caps.console());
    engine.on_print(move |text| console.write_line(text));
    let console = Arc::clone(caps.console());
    engine.on_debug(move |text, source, _pos| match source {
        Some(source) => console.write_line(&format!("[debug:{}] {}", source, text)),
        None => console.write_line(&format!("[debug] {}", text)),
    });

    // Host capabilities
    engine.register_static_module(HOST_MODULE, caps.bindings().to_module()?.into());

    // Priorities
    engine.register_type_with_name::<Priority>("Priority");
    engine.register_fn("to_string", |p: &mut Priority| p.name().to_string());
    engine.register_fn("==", |a: Priority, b: Priority| a == b);
    engine.register_static_module("Priority", priority_module().into());

    // Trigger registration
    engine.register_type_with_name::<ScriptTrigger>("Trigger");
    let triggers = caps.triggers().clone();
    engine.register_fn(
        "register",
        move |trigger: &str, handler: &str| -> ScriptResult<ScriptTrigger> {
            triggers
                .register(trigger, HandlerRef::Named(handler.to_string()))
                .map(ScriptTrigger::from)
                .map_err(script_error)
        },
    );
    let triggers = caps.triggers().clone();
    engine.register_fn(
        "register",
        move |trigger: &str, handler: FnPtr| -> ScriptResult<ScriptTrigger> {
            triggers
                .register(trigger, HandlerRef::Pointer(handler))
                .map(ScriptTrigger::from)
                .map_err(script_error)
        },
    );
    engine.register_fn("setPriority", ScriptTrigger::set_priority);
    engine.register_fn("setCriteria", ScriptTrigger::set_criteria);
    engine.register_fn("setCommandName", ScriptTrigger::set_command_name);
    engine.register_fn("setName", ScriptTrigger::set_command_name);
    engine.register_fn("unregister", |t: &mut ScriptTrigger| t.handle.unregister());
    engine.register_get("id", |t: &mut ScriptTrigger| t.handle.id() as i64);
    engine.register_get("trigger", |t: &mut ScriptTrigger| {
        t.handle.trigger().to_string()
    });
    engine.register_get("registered", |t: &mut ScriptTrigger| {
        t.handle.is_registered()
    });
    engine.register_get("priority", |t: &mut ScriptTrigger| -> ScriptResult<Priority> {
        t.handle.priority().map_err(script_error)
    });
    engine.register_fn("to_string", |t: &mut ScriptTrigger| {
        format!("Trigger(#{} {})", t.handle.id(), t.handle.trigger())
    });

    // Events and cancellation
    engine.register_type_with_name::<ScriptEvent>("Event");
    engine.register_fn("cancel", |event: &mut ScriptEvent| -> ScriptResult<()> {
        cancel(event).map_err(script_error)
    });
    engine.register_fn("cancel", |value: Dynamic| -> ScriptResult<()> {
        Err(script_error(PreludeError::NotCancelable(
            value.type_name().to_string(),
        )))
    });
    engine.register_get("trigger", |e: &mut ScriptEvent| e.trigger_name());
    engine.register_get("cancelable", |e: &mut ScriptEvent| e.is_cancelable());
    engine.register_get("canceled", |e: &mut ScriptEvent| e.is_canceled());
    engine.register_get("payload", |e: &mut ScriptEvent| e.payload_map());
    engine.register_indexer_get(|e: &mut ScriptEvent, field: &str| e.field(field));
    engine.register_fn("to_string", |e: &mut ScriptEvent| {
        let event = e.snapshot();
        let state = if event.is_canceled() { " canceled" } else { "" };
        format!("Event({}{})", event.trigger(), state)
    });

    // Easing
    let default_jump = caps.default_jump();
    engine.register_fn(
        "easeOut",
        move |start: Dynamic, finish: Dynamic, speed: Dynamic| -> ScriptResult<f64> {
            ease_out(number(&start)?, number(&finish)?, number(&speed)?, default_jump)
                .map_err(script_error)
        },
    );
    engine.register_fn(
        "easeOut",
        move |start: Dynamic, finish: Dynamic, speed: Dynamic, jump: Dynamic| -> ScriptResult<f64> {
            let jump = if jump.is_unit() {
                default_jump
            } else {
                number(&jump)?
            };
            ease_out(number(&start)?, number(&finish)?, number(&speed)?, jump)
                .map_err(script_error)
        },
    );

    tracing::debug!(
        "Prelude installed with {} trigger type(s) and {} host binding(s)",
        caps.catalog().len(),
        caps.bindings().len()
    );

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chatscript_core::console::CapturedConsole;

    fn engine_with(caps: &HostCapabilities) -> Engine {
        let mut engine = Engine::new();
        register_prelude_api(&mut engine, caps).unwrap();
        engine
    }

    #[test]
    fn test_ease_out_defaults_jump() {
        let engine = engine_with(&HostCapabilities::default());
        assert_relative_eq!(engine.eval::<f64>("easeOut(0, 10, 2)").unwrap(), 5.0);
        assert_relative_eq!(engine.eval::<f64>("easeOut(9.6, 10, 2, 1)").unwrap(), 10.0);
        assert_relative_eq!(engine.eval::<f64>("easeOut(9.6, 10, 2, ())").unwrap(), 10.0);
    }

    #[test]
    fn test_ease_out_configured_jump() {
        let caps = HostCapabilities::default().with_default_jump(0.1);
        let engine = engine_with(&caps);
        assert_relative_eq!(engine.eval::<f64>("easeOut(9.6, 10.0, 2.0)").unwrap(), 9.8, epsilon = 1e-9);
    }

    #[test]
    fn test_ease_out_zero_speed_fails() {
        let engine = engine_with(&HostCapabilities::default());
        let err = engine.eval::<f64>("easeOut(0, 10, 0)").unwrap_err();
        assert!(err.to_string().contains("Division by zero"), "{err}");
    }

    #[test]
    fn test_ease_out_rejects_strings() {
        let engine = engine_with(&HostCapabilities::default());
        assert!(engine.eval::<f64>(r#"easeOut("a", 10, 2)"#).is_err());
    }

    #[test]
    fn test_print_goes_to_console() {
        let console = CapturedConsole::new();
        let caps = HostCapabilities::default().with_console(Arc::new(console.clone()));
        let engine = engine_with(&caps);

        engine.run(r#"print("hello"); print(42);"#).unwrap();
        assert_eq!(console.lines(), vec!["hello", "42"]);
    }

    #[test]
    fn test_register_unknown_trigger_fails() {
        let caps = HostCapabilities::default();
        let engine = engine_with(&caps);
        let err = engine.run(r#"register("teleport", "onTeleport");"#).unwrap_err();
        assert!(err.to_string().contains("Unknown trigger type: teleport"), "{err}");
        assert!(caps.triggers().is_empty());
    }

    #[test]
    fn test_register_returns_handle() {
        let caps = HostCapabilities::default();
        let engine = engine_with(&caps);
        let trigger = engine
            .eval::<ScriptTrigger>(r#"register("chat", "onChat").setPriority(Priority::HIGH)"#)
            .unwrap();

        assert_eq!(trigger.handle().trigger(), "chat");
        assert_eq!(trigger.handle().priority(), Ok(Priority::High));
        assert_eq!(caps.triggers().count_for("chat"), 1);
    }

    #[test]
    fn test_command_name_only_for_commands() {
        let engine = engine_with(&HostCapabilities::default());
        assert!(engine.run(r#"register("command", "onWarp").setName("warp");"#).is_ok());
        assert!(engine.run(r#"register("chat", "onChat").setCommandName("warp");"#).is_err());
    }

    #[test]
    fn test_cancel_rejects_plain_values() {
        let engine = engine_with(&HostCapabilities::default());
        let err = engine.run("cancel(42);").unwrap_err();
        assert!(err.to_string().contains("not a cancelable event"), "{err}");
    }

    #[test]
    fn test_host_bindings_visible() {
        let mut caps = HostCapabilities::default();
        caps.bindings_mut()
            .bind("Version", "1.8.9".to_string())
            .deprecated_alias("GameVersion", "Version");
        let engine = engine_with(&caps);

        assert_eq!(engine.eval::<String>("host::GameVersion").unwrap(), "1.8.9");
    }

    #[test]
    fn test_invalid_bindings_fail_installation() {
        let mut caps = HostCapabilities::default();
        caps.bindings_mut().alias("RenderLib", "Renderer");
        let mut engine = Engine::new();
        assert!(register_prelude_api(&mut engine, &caps).is_err());
    }

    #[test]
    fn test_handler_ref_names() {
        assert_eq!(HandlerRef::Named("onChat".into()).name(), "onChat");
        assert_eq!(
            HandlerRef::Pointer(FnPtr::new("onTick").unwrap()).name(),
            "onTick"
        );
    }
}
