//! Application lifecycle events.
//!
//! The host publishes [`SystemEvent`]s; components subscribe for the kinds
//! they care about. Listeners are held weakly, so subscribing never keeps a
//! component alive.

use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;

/// Lifecycle notifications delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// The application finished initializing.
    PostConstructApplication,
    /// The application is about to be torn down.
    PreDestroyApplication,
    /// A custom scope is about to be destroyed.
    PreDestroyScope { scope: String },
}

/// Discriminant of [`SystemEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEventKind {
    PostConstructApplication,
    PreDestroyApplication,
    PreDestroyScope,
}

impl SystemEvent {
    pub fn kind(&self) -> SystemEventKind {
        match self {
            SystemEvent::PostConstructApplication => SystemEventKind::PostConstructApplication,
            SystemEvent::PreDestroyApplication => SystemEventKind::PreDestroyApplication,
            SystemEvent::PreDestroyScope { .. } => SystemEventKind::PreDestroyScope,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemEvent::PostConstructApplication => "PostConstructApplication",
            SystemEvent::PreDestroyApplication => "PreDestroyApplication",
            SystemEvent::PreDestroyScope { .. } => "PreDestroyScope",
        }
    }
}

/// Errors a listener can raise while processing an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// The listener does not handle this kind of event.
    #[error("invalid argument: unexpected event {0}")]
    InvalidArgument(&'static str),
}

/// Receives lifecycle events.
pub trait SystemEventListener: Send + Sync {
    fn process_event(&self, event: &SystemEvent) -> Result<(), EventError>;

    /// Whether events published by `source` should reach this listener.
    fn is_listener_for_source(&self, source: &str) -> bool;
}

/// Event bus owned by the host application.
pub struct ApplicationEvents {
    source: String,
    listeners: Mutex<Vec<(SystemEventKind, Weak<dyn SystemEventListener>)>>,
}

impl ApplicationEvents {
    /// Create a bus for the application called `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Deliver future events of `kind` to `listener`.
    pub fn subscribe(&self, kind: SystemEventKind, listener: Weak<dyn SystemEventListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((kind, listener));
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(_, l)| l.strong_count() > 0)
            .count()
    }

    /// Publish an event to every matching listener.
    ///
    /// Listeners run outside the bus lock. Errors are logged and returned;
    /// one failing listener does not stop delivery to the rest.
    pub fn publish(&self, event: &SystemEvent) -> Vec<EventError> {
        let targets: Vec<Arc<dyn SystemEventListener>> = {
            let mut listeners = self
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners.retain(|(_, l)| l.strong_count() > 0);
            listeners
                .iter()
                .filter(|(kind, _)| *kind == event.kind())
                .filter_map(|(_, l)| l.upgrade())
                .collect()
        };

        tracing::debug!(event = event.name(), listeners = targets.len(), "Publishing system event");

        let mut errors = Vec::new();
        for listener in targets {
            if !listener.is_listener_for_source(&self.source) {
                continue;
            }
            if let Err(e) = listener.process_event(event) {
                tracing::error!(event = event.name(), error = %e, "System event listener failed");
                errors.push(e);
            }
        }
        errors
    }
}
