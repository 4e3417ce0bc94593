//! Directory lookups.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::broker::ConnectionFactory;
use crate::naming::{Name, NamingError};

/// An object bound in the directory.
#[derive(Clone)]
pub enum Binding {
    /// A factory for broker connections.
    ConnectionFactory(Arc<dyn ConnectionFactory>),
    /// A namespace under which topic destinations live.
    TopicNamespace(String),
}

impl Binding {
    /// Human readable kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::ConnectionFactory(_) => "connection factory",
            Binding::TopicNamespace(_) => "topic namespace",
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::ConnectionFactory(_) => f.write_str("ConnectionFactory(..)"),
            Binding::TopicNamespace(ns) => f.debug_tuple("TopicNamespace").field(ns).finish(),
        }
    }
}

/// Read access to a directory of named resources.
pub trait NamingContext: Send + Sync {
    /// Resolve a name to its binding.
    fn lookup(&self, name: &Name) -> Result<Binding, NamingError>;

    /// Resolve a name that must be bound to a connection factory.
    fn lookup_connection_factory(
        &self,
        name: &Name,
    ) -> Result<Arc<dyn ConnectionFactory>, NamingError> {
        match self.lookup(name)? {
            Binding::ConnectionFactory(factory) => Ok(factory),
            other => Err(NamingError::UnexpectedBinding {
                name: name.clone(),
                expected: "connection factory",
                actual: other.kind(),
            }),
        }
    }

    /// Resolve a name that must be bound to a topic namespace.
    fn lookup_topic_namespace(&self, name: &Name) -> Result<String, NamingError> {
        match self.lookup(name)? {
            Binding::TopicNamespace(namespace) => Ok(namespace),
            other => Err(NamingError::UnexpectedBinding {
                name: name.clone(),
                expected: "topic namespace",
                actual: other.kind(),
            }),
        }
    }
}

/// Process-local directory.
#[derive(Default)]
pub struct InMemoryNamingContext {
    bindings: DashMap<Name, Binding>,
}

impl InMemoryNamingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, failing if it is already bound.
    pub fn bind(&self, name: Name, binding: Binding) -> Result<(), NamingError> {
        use dashmap::mapref::entry::Entry;

        match self.bindings.entry(name) {
            Entry::Occupied(entry) => Err(NamingError::AlreadyBound(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(name = %entry.key(), kind = binding.kind(), "Bound name");
                entry.insert(binding);
                Ok(())
            }
        }
    }

    /// Bind `name`, replacing any previous binding.
    pub fn rebind(&self, name: Name, binding: Binding) {
        self.bindings.insert(name, binding);
    }

    /// Remove the binding for `name`.
    pub fn unbind(&self, name: &Name) -> Result<Binding, NamingError> {
        self.bindings
            .remove(name)
            .map(|(_, binding)| binding)
            .ok_or_else(|| NamingError::NameNotFound(name.clone()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl NamingContext for InMemoryNamingContext {
    fn lookup(&self, name: &Name) -> Result<Binding, NamingError> {
        self.bindings
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| NamingError::NameNotFound(name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::LocalBroker;
    use crate::naming::NameParser;

    fn name(raw: &str) -> Name {
        NameParser.parse(raw).unwrap()
    }

    #[test]
    fn test_bind_and_lookup() {
        let ctx = InMemoryNamingContext::new();
        ctx.bind(name("topic"), Binding::TopicNamespace("topic".into()))
            .unwrap();

        assert_eq!(ctx.lookup_topic_namespace(&name("/topic")).unwrap(), "topic");
        assert!(matches!(
            ctx.lookup(&name("missing")),
            Err(NamingError::NameNotFound(_))
        ));
    }

    #[test]
    fn test_bind_twice_fails_rebind_replaces() {
        let ctx = InMemoryNamingContext::new();
        ctx.bind(name("ns"), Binding::TopicNamespace("a".into())).unwrap();
        assert!(matches!(
            ctx.bind(name("ns"), Binding::TopicNamespace("b".into())),
            Err(NamingError::AlreadyBound(_))
        ));

        ctx.rebind(name("ns"), Binding::TopicNamespace("b".into()));
        assert_eq!(ctx.lookup_topic_namespace(&name("ns")).unwrap(), "b");

        ctx.unbind(&name("ns")).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_unexpected_binding_kind() {
        let ctx = InMemoryNamingContext::new();
        let broker = LocalBroker::new();
        ctx.bind(name("cf"), Binding::ConnectionFactory(broker.connection_factory()))
            .unwrap();

        let err = ctx.lookup_topic_namespace(&name("cf")).unwrap_err();
        assert!(matches!(
            err,
            NamingError::UnexpectedBinding {
                expected: "topic namespace",
                actual: "connection factory",
                ..
            }
        ));
        assert!(ctx.lookup_connection_factory(&name("cf")).is_ok());
    }
}
