//! Error types for chatscript

use thiserror::Error;

/// Result type alias using chatscript's error type
pub type Result<T> = std::result::Result<T, PreludeError>;

/// Errors raised by the prelude helpers and the trigger registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreludeError {
    /// The trigger type is not part of the host's catalog
    #[error("Unknown trigger type: {0}")]
    UnknownTriggerType(String),

    /// The handler could not be resolved to a callable
    #[error("Unresolved handler '{handler}' for trigger '{trigger}'")]
    UnresolvedHandler { trigger: String, handler: String },

    /// The event was dispatched by a trigger type that cannot be canceled
    #[error("Cannot cancel {0}: not a cancelable event")]
    NotCancelable(String),

    /// Easing speed was zero
    #[error("Division by zero: easing speed must be non-zero")]
    DivideByZero,

    /// Criteria were set on a trigger type without a subject field
    #[error("Trigger '{0}' does not support criteria")]
    CriteriaUnsupported(String),

    /// The registration behind a handle was removed
    #[error("Trigger registration #{0} no longer exists")]
    StaleHandle(u64),

    /// An event was built without a field its trigger type requires
    #[error("Event for trigger '{trigger}' is missing payload field '{field}'")]
    MissingPayloadField { trigger: String, field: String },

    /// The trigger catalog is malformed
    #[error("Invalid trigger catalog: {0}")]
    InvalidCatalog(String),

    /// A host capability binding is malformed
    #[error("Invalid binding '{name}': {reason}")]
    InvalidBinding { name: String, reason: String },
}
