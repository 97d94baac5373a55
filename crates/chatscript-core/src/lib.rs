//! # chatscript core
//!
//! Host-independent pieces of the script prelude:
//!
//! - [`trigger`]: the catalog of trigger types a host can fire
//! - [`dispatch`]: trigger registration, priorities, criteria and dispatch
//! - [`event`]: events and the one-way cancellation helper
//! - [`easing`]: the `easeOut` animation step
//! - [`console`]: sinks for `print`
//! - [`config`]: the host configuration file
//!
//! ## Quick Start
//!
//! ```rust
//! use chatscript_core::prelude::*;
//! use std::sync::Arc;
//!
//! let registry: TriggerRegistry<fn(&mut Event)> =
//!     TriggerRegistry::new(Arc::new(TriggerCatalog::standard()));
//!
//! registry.register("chat", |event: &mut Event| {
//!     event.cancel().ok();
//! })?;
//!
//! let spec = registry.catalog().resolve("chat")?;
//! let mut payload = Payload::new();
//! payload.insert("message".into(), "hello".into());
//! let mut event = Event::new(spec, payload)?;
//!
//! let summary = registry.dispatch(&mut event, |_, handler, event| {
//!     handler(event);
//!     Ok(())
//! })?;
//! assert!(summary.canceled);
//! # Ok::<(), chatscript_core::PreludeError>(())
//! ```

pub mod config;
pub mod console;
pub mod dispatch;
pub mod easing;
pub mod event;
pub mod trigger;

mod error;

pub use error::{PreludeError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PreludeConfig;
    pub use crate::console::{CapturedConsole, ConsoleSink, ConsoleTarget, print};
    pub use crate::dispatch::{
        CancelPolicy, Criteria, DispatchEngine, DispatchSummary, Priority, TriggerHandle,
        TriggerRegistry, register,
    };
    pub use crate::easing::{DEFAULT_JUMP, EaseOut, ease_out};
    pub use crate::event::{Cancelable, Dispatchable, Event, Payload, cancel};
    pub use crate::trigger::{TriggerCatalog, TriggerSpec};

    pub use crate::{PreludeError, Result};
}
