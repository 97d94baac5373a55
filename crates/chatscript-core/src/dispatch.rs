//! Trigger registration and dispatch
//!
//! [`TriggerRegistry`] is an in-memory dispatch engine. Handlers are registered
//! against a trigger type from the [`TriggerCatalog`] and receive the events
//! fired for that type, ordered by [`Priority`] and filtered by optional
//! [`Criteria`]. Registration returns a [`TriggerHandle`] for fluent
//! configuration.
//!
//! Code that only needs to register handlers should depend on the
//! [`DispatchEngine`] trait rather than the concrete registry.

use crate::error::{PreludeError, Result};
use crate::event::Dispatchable;
use crate::trigger::TriggerCatalog;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Order in which handlers of the same trigger type run
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Lowest,
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Highest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Priority::Lowest => "LOWEST",
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Highest => "HIGHEST",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What happens to the rest of the chain once a handler cancels the event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelPolicy {
    /// Every matching handler runs
    #[default]
    RunAll,
    /// Handlers after the canceling one are skipped
    StopOnCancel,
}

/// Filter on an event's subject text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criteria {
    Exact(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
}

impl Criteria {
    /// Wildcard placeholder in criteria patterns
    pub const WILDCARD: &'static str = "${*}";

    /// Parse a pattern where `${*}` at either end matches anything
    ///
    /// `"hi"` is exact, `"hi${*}"` a prefix, `"${*}hi"` a suffix and
    /// `"${*}hi${*}"` a substring match.
    pub fn parse(pattern: &str) -> Self {
        let leading = pattern.strip_prefix(Self::WILDCARD);
        let body = leading.unwrap_or(pattern);
        let trailing = body.strip_suffix(Self::WILDCARD);
        let text = trailing.unwrap_or(body).to_string();

        match (leading.is_some(), trailing.is_some()) {
            (true, true) => Criteria::Contains(text),
            (true, false) => Criteria::EndsWith(text),
            (false, true) => Criteria::StartsWith(text),
            (false, false) => Criteria::Exact(text),
        }
    }

    pub fn matches(&self, subject: &str) -> bool {
        match self {
            Criteria::Exact(text) => subject == text,
            Criteria::StartsWith(text) => subject.starts_with(text.as_str()),
            Criteria::EndsWith(text) => subject.ends_with(text.as_str()),
            Criteria::Contains(text) => subject.contains(text.as_str()),
        }
    }
}

/// Identifier of a registration, unique within a registry
pub type RegistrationId = u64;

/// Outcome of dispatching one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Handlers invoked
    pub invoked: usize,
    /// Matching handlers not invoked because of [`CancelPolicy::StopOnCancel`]
    pub skipped: usize,
    /// Whether the event ended up canceled
    pub canceled: bool,
}

/// Registration side of a dispatch engine
pub trait DispatchEngine {
    /// Callback type the engine invokes
    type Handler;
    /// Handle returned for further configuration
    type Handle;

    fn register(&self, trigger: &str, handler: Self::Handler) -> Result<Self::Handle>;
}

/// Register `handler` for `trigger` on any dispatch engine
pub fn register<D>(engine: &D, trigger: &str, handler: D::Handler) -> Result<D::Handle>
where
    D: DispatchEngine + ?Sized,
{
    engine.register(trigger, handler)
}

struct Registration<H> {
    id: RegistrationId,
    trigger: String,
    handler: Arc<H>,
    priority: Priority,
    criteria: Option<Criteria>,
}

struct Table<H> {
    next_id: RegistrationId,
    entries: Vec<Registration<H>>,
}

impl<H> Table<H> {
    fn entry_mut(&mut self, id: RegistrationId) -> Result<&mut Registration<H>> {
        self.entries
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| {
                tracing::warn!("Trigger registration #{} was already removed", id);
                PreludeError::StaleHandle(id)
            })
    }
}

/// In-memory dispatch engine
///
/// Cloning yields another handle to the same table.
pub struct TriggerRegistry<H> {
    catalog: Arc<TriggerCatalog>,
    table: Arc<Mutex<Table<H>>>,
    policy: CancelPolicy,
}

impl<H> Clone for TriggerRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            table: Arc::clone(&self.table),
            policy: self.policy,
        }
    }
}

impl<H> TriggerRegistry<H> {
    pub fn new(catalog: Arc<TriggerCatalog>) -> Self {
        Self {
            catalog,
            table: Arc::new(Mutex::new(Table {
                next_id: 1,
                entries: Vec::new(),
            })),
            policy: CancelPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CancelPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CancelPolicy {
        self.policy
    }

    pub fn catalog(&self) -> &Arc<TriggerCatalog> {
        &self.catalog
    }

    /// Register a handler; registrations accumulate
    pub fn register(&self, trigger: &str, handler: H) -> Result<TriggerHandle<H>> {
        let spec = self.catalog.resolve(trigger)?;
        let mut table = self.table.lock();

        let id = table.next_id;
        table.next_id += 1;
        table.entries.push(Registration {
            id,
            trigger: spec.name.clone(),
            handler: Arc::new(handler),
            priority: Priority::default(),
            criteria: None,
        });

        tracing::debug!("Registered trigger #{} for {}", id, spec.name);

        Ok(TriggerHandle {
            id,
            trigger: spec.name.clone(),
            supports_criteria: spec.supports_criteria(),
            table: Arc::clone(&self.table),
        })
    }

    /// Handlers that should receive `event`, in invocation order
    pub fn matching<E: Dispatchable + ?Sized>(&self, event: &E) -> Vec<(RegistrationId, Arc<H>)> {
        let trigger = event.trigger_name();
        let subject = event.subject();
        let table = self.table.lock();

        let mut selected: Vec<&Registration<H>> = table
            .entries
            .iter()
            .filter(|r| r.trigger == trigger)
            .filter(|r| match (&r.criteria, &subject) {
                (None, _) => true,
                (Some(criteria), Some(subject)) => criteria.matches(subject),
                (Some(_), None) => false,
            })
            .collect();

        // Stable sort keeps registration order within a priority
        selected.sort_by(|a, b| b.priority.cmp(&a.priority));
        selected
            .into_iter()
            .map(|r| (r.id, Arc::clone(&r.handler)))
            .collect()
    }

    /// Run the handler chain for `event`
    ///
    /// The table is not locked while handlers run, so handlers may register
    /// or unregister triggers; such changes apply to the next dispatch. An
    /// error from `invoke` aborts the chain.
    pub fn dispatch<E, F>(&self, event: &mut E, mut invoke: F) -> Result<DispatchSummary>
    where
        E: Dispatchable + ?Sized,
        F: FnMut(RegistrationId, &H, &mut E) -> Result<()>,
    {
        let chain = self.matching(event);
        let mut summary = DispatchSummary::default();

        for (position, (id, handler)) in chain.iter().enumerate() {
            if self.policy == CancelPolicy::StopOnCancel && event.is_canceled() {
                summary.skipped = chain.len() - position;
                tracing::debug!(
                    "{} canceled, skipping {} handler(s)",
                    event.trigger_name(),
                    summary.skipped
                );
                break;
            }
            invoke(*id, &**handler, event)?;
            summary.invoked += 1;
        }

        summary.canceled = event.is_canceled();
        Ok(summary)
    }

    /// Remove a registration, returning whether it existed
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut table = self.table.lock();
        let before = table.entries.len();
        table.entries.retain(|r| r.id != id);
        before != table.entries.len()
    }

    /// Remove every registration created at or after `id`
    pub fn truncate_from(&self, id: RegistrationId) -> usize {
        let mut table = self.table.lock();
        let before = table.entries.len();
        table.entries.retain(|r| r.id < id);
        before - table.entries.len()
    }

    /// Id the next registration will get
    pub fn next_id(&self) -> RegistrationId {
        self.table.lock().next_id
    }

    /// Drop all registrations
    pub fn clear(&self) {
        let mut table = self.table.lock();
        let count = table.entries.len();
        table.entries.clear();
        tracing::debug!("Cleared {} trigger registration(s)", count);
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().entries.is_empty()
    }

    /// Number of registrations for a trigger type
    pub fn count_for(&self, trigger: &str) -> usize {
        let Ok(spec) = self.catalog.resolve(trigger) else {
            return 0;
        };
        self.table
            .lock()
            .entries
            .iter()
            .filter(|r| r.trigger == spec.name)
            .count()
    }

    /// Apply `f` to every registered handler with its trigger name
    pub fn for_each_handler(&self, mut f: impl FnMut(RegistrationId, &str, &H)) {
        let table = self.table.lock();
        for entry in &table.entries {
            f(entry.id, &entry.trigger, &entry.handler);
        }
    }
}

impl<H> DispatchEngine for TriggerRegistry<H> {
    type Handler = H;
    type Handle = TriggerHandle<H>;

    fn register(&self, trigger: &str, handler: H) -> Result<TriggerHandle<H>> {
        TriggerRegistry::register(self, trigger, handler)
    }
}

/// Handle to one registration
///
/// Configuration calls return the handle again so they can be chained.
pub struct TriggerHandle<H> {
    id: RegistrationId,
    trigger: String,
    supports_criteria: bool,
    table: Arc<Mutex<Table<H>>>,
}

impl<H> Clone for TriggerHandle<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            trigger: self.trigger.clone(),
            supports_criteria: self.supports_criteria,
            table: Arc::clone(&self.table),
        }
    }
}

impl<H> fmt::Debug for TriggerHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl<H> TriggerHandle<H> {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Canonical name of the trigger type
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn set_priority(&self, priority: Priority) -> Result<&Self> {
        self.table.lock().entry_mut(self.id)?.priority = priority;
        Ok(self)
    }

    pub fn priority(&self) -> Result<Priority> {
        Ok(self.table.lock().entry_mut(self.id)?.priority)
    }

    /// Only run for events whose subject matches `criteria`
    pub fn set_criteria(&self, criteria: Criteria) -> Result<&Self> {
        if !self.supports_criteria {
            return Err(PreludeError::CriteriaUnsupported(self.trigger.clone()));
        }
        self.table.lock().entry_mut(self.id)?.criteria = Some(criteria);
        Ok(self)
    }

    pub fn criteria(&self) -> Result<Option<Criteria>> {
        Ok(self.table.lock().entry_mut(self.id)?.criteria.clone())
    }

    /// Remove the registration; returns false if it was already gone
    pub fn unregister(&self) -> bool {
        let mut table = self.table.lock();
        let before = table.entries.len();
        table.entries.retain(|r| r.id != self.id);
        before != table.entries.len()
    }

    pub fn is_registered(&self) -> bool {
        self.table.lock().entries.iter().any(|r| r.id == self.id)
    }
}
