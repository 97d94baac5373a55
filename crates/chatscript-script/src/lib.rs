//! chatscript script - Rhai prelude for event-driven chat scripts
//!
//! Scripts register handlers for trigger types, the host fires events, and
//! handlers run in priority order.
//!
//! ## Example Script
//!
//! ```rhai
//! // Handler registered by function name
//! register("chat", "onChat").setPriority(Priority::HIGH);
//!
//! fn onChat(event) {
//!     if event["message"].contains("spam") {
//!         cancel(event);
//!     }
//! }
//!
//! // Handler registered as a closure, filtered by criteria
//! register("chat", |event| print("Welcome!"))
//!     .setCriteria("${*} joined the game");
//! ```
//!
//! ## Host Bindings
//!
//! Values the host exposes are read through the `host` module:
//!
//! ```rhai
//! let x = easeOut(host::Player["x"], 100.0, 5.0);
//! ```
//!
//! ## Easing
//!
//! `easeOut(start, finish, speed)` uses the configured default jump;
//! `easeOut(start, finish, speed, jump)` takes an explicit one.

pub mod bindings;
pub mod capabilities;
pub mod engine;
pub mod prelude_api;

#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use bindings::{HOST_MODULE, HostBindings};
pub use capabilities::HostCapabilities;
pub use engine::{
    DispatchReport, HandlerFailure, LoadedScript, ScriptEngine, ScriptError, ScriptOrigin,
};
pub use prelude_api::{HandlerRef, ScriptEvent, ScriptTrigger, register_prelude_api};

#[cfg(feature = "file-watcher")]
pub use watcher::{ScriptWatcher, WatchEvent};

// Re-export for convenience
pub use chatscript_core::PreludeError;
pub use chatscript_core::event::{Event, Payload};
