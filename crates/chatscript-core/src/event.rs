//! Events handed to trigger handlers
//!
//! An [`Event`] is created by the dispatcher right before the handler chain
//! runs and discarded afterwards. Handlers may cancel it; nothing can
//! un-cancel it.

use crate::error::{PreludeError, Result};
use crate::trigger::TriggerSpec;
use serde_json::{Map, Value};

/// Payload of an event: field name to JSON value
pub type Payload = Map<String, Value>;

/// Anything carrying a one-way cancellation flag
pub trait Cancelable {
    /// Name of the trigger type that produced the event
    fn trigger_name(&self) -> String;

    fn is_cancelable(&self) -> bool;

    fn is_canceled(&self) -> bool;

    /// Set the flag. Callers go through [`cancel`], which checks cancelability.
    fn mark_canceled(&mut self);
}

/// Events the registry can route to handlers
pub trait Dispatchable: Cancelable {
    /// Text that registration criteria are matched against
    fn subject(&self) -> Option<String>;
}

/// Mark an event as canceled
///
/// Fails with [`PreludeError::NotCancelable`] when the event's trigger type
/// does not allow cancellation. Canceling twice is a no-op.
pub fn cancel<E: Cancelable + ?Sized>(event: &mut E) -> Result<()> {
    if !event.is_cancelable() {
        return Err(PreludeError::NotCancelable(event.trigger_name()));
    }
    event.mark_canceled();
    Ok(())
}

/// A dispatched event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    trigger: String,
    cancelable: bool,
    canceled: bool,
    subject_field: Option<String>,
    payload: Payload,
}

impl Event {
    /// Build an event for a trigger type, checking required payload fields
    pub fn new(spec: &TriggerSpec, payload: Payload) -> Result<Self> {
        if let Some(missing) = spec.payload.iter().find(|f| !payload.contains_key(*f)) {
            return Err(PreludeError::MissingPayloadField {
                trigger: spec.name.clone(),
                field: missing.clone(),
            });
        }

        Ok(Self {
            trigger: spec.name.clone(),
            cancelable: spec.cancelable,
            canceled: false,
            subject_field: spec.subject.clone(),
            payload,
        })
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Look up a payload field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    /// Cancel this event, see [`cancel`]
    pub fn cancel(&mut self) -> Result<()> {
        cancel(self)
    }
}

impl Cancelable for Event {
    fn trigger_name(&self) -> String {
        self.trigger.clone()
    }

    fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    fn is_canceled(&self) -> bool {
        self.canceled
    }

    fn mark_canceled(&mut self) {
        self.canceled = true;
    }
}

impl Dispatchable for Event {
    fn subject(&self) -> Option<String> {
        let field = self.subject_field.as_ref()?;
        match self.payload.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::trigger::TriggerCatalog;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    #[test]
    fn test_cancel_sets_flag() {
        let catalog = TriggerCatalog::standard();
        let spec = catalog.resolve("chat").unwrap();
        let mut event = Event::new(spec, payload(json!({ "message": "hi" }))).unwrap();

        assert!(!event.is_canceled());
        cancel(&mut event).unwrap();
        assert!(event.is_canceled());
    }

    #[test]
    fn test_cancel_twice_stays_canceled() {
        let catalog = TriggerCatalog::standard();
        let spec = catalog.resolve("chat").unwrap();
        let mut event = Event::new(spec, payload(json!({ "message": "hi" }))).unwrap();

        event.cancel().unwrap();
        event.cancel().unwrap();
        assert!(event.is_canceled());
    }

    #[test]
    fn test_cancel_not_cancelable() {
        let catalog = TriggerCatalog::standard();
        let spec = catalog.resolve("worldLoad").unwrap();
        let mut event = Event::new(spec, Payload::new()).unwrap();

        assert_eq!(
            cancel(&mut event),
            Err(PreludeError::NotCancelable("worldLoad".into()))
        );
        assert!(!event.is_canceled());
    }

    #[test]
    fn test_missing_payload_field() {
        let catalog = TriggerCatalog::standard();
        let spec = catalog.resolve("chat").unwrap();
        let err = Event::new(spec, Payload::new()).unwrap_err();
        assert_eq!(
            err,
            PreludeError::MissingPayloadField {
                trigger: "chat".into(),
                field: "message".into(),
            }
        );
    }

    #[test]
    fn test_subject_reads_configured_field() {
        let catalog = TriggerCatalog::standard();
        let spec = catalog.resolve("command").unwrap();
        let event = Event::new(spec, payload(json!({ "name": "warp", "args": [] }))).unwrap();
        assert_eq!(event.subject().as_deref(), Some("warp"));

        let tick = Event::new(catalog.resolve("tick").unwrap(), payload(json!({ "ticks": 3 })))
            .unwrap();
        assert_eq!(tick.subject(), None);
    }
}
