//! In-process broker.
//!
//! # Responsibilities
//! - Keep named subscriptions per destination
//! - Deliver published messages to matching subscriptions of started connections
//! - Optionally enforce a single username/password pair
//!
//! # Design Decisions
//! - Destinations are created implicitly on first subscribe
//! - Listeners are collected before delivery so no map guard is held while
//!   foreign code runs

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::broker::{
    BrokerError, BrokerResult, Connection, ConnectionFactory, Credentials, Message,
    MessageListener,
};

/// Connection state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created = 0,
    Started = 1,
    Closed = 2,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectionState::Started,
            2 => ConnectionState::Closed,
            _ => ConnectionState::Created,
        }
    }
}

struct Subscription {
    connection_id: u64,
    selector: Option<String>,
    listener: Arc<dyn MessageListener>,
    connection_state: Arc<AtomicU8>,
}

impl Subscription {
    fn is_active(&self) -> bool {
        ConnectionState::from(self.connection_state.load(Ordering::Acquire))
            == ConnectionState::Started
    }
}

#[derive(Default)]
struct BrokerState {
    credentials: Option<Credentials>,
    /// destination -> subscription name -> subscription
    destinations: DashMap<String, DashMap<String, Subscription>>,
    next_connection_id: AtomicU64,
}

/// A broker living inside the current process.
#[derive(Clone, Default)]
pub struct LocalBroker {
    state: Arc<BrokerState>,
}

impl LocalBroker {
    /// Create a broker that accepts any credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a broker that only accepts the given credentials.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            state: Arc::new(BrokerState {
                credentials: Some(credentials),
                ..Default::default()
            }),
        }
    }

    /// A connection factory handing out connections to this broker.
    pub fn connection_factory(&self) -> Arc<dyn ConnectionFactory> {
        Arc::new(LocalConnectionFactory {
            state: self.state.clone(),
        })
    }

    /// Number of subscriptions on a destination.
    pub fn subscription_count(&self, destination: &str) -> usize {
        self.state
            .destinations
            .get(destination)
            .map_or(0, |subs| subs.len())
    }

    /// Names of all destinations that currently have subscriptions.
    pub fn destinations(&self) -> Vec<String> {
        self.state
            .destinations
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }
}

struct LocalConnectionFactory {
    state: Arc<BrokerState>,
}

impl ConnectionFactory for LocalConnectionFactory {
    fn create_connection(
        &self,
        credentials: &Credentials,
        client_id: &str,
    ) -> BrokerResult<Arc<dyn Connection>> {
        if let Some(expected) = &self.state.credentials {
            if expected != credentials {
                tracing::warn!(username = %credentials.username, "Broker rejected credentials");
                return Err(BrokerError::Authentication(credentials.username.clone()));
            }
        }

        let id = self.state.next_connection_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id = id, client_id = %client_id, "Broker connection opened");

        Ok(Arc::new(LocalConnection {
            id,
            client_id: client_id.to_string(),
            broker: self.state.clone(),
            state: Arc::new(AtomicU8::new(ConnectionState::Created as u8)),
            owned: Mutex::new(Vec::new()),
        }))
    }
}

struct LocalConnection {
    id: u64,
    client_id: String,
    broker: Arc<BrokerState>,
    state: Arc<AtomicU8>,
    /// (destination, subscription) pairs created through this connection.
    owned: Mutex<Vec<(String, String)>>,
}

impl LocalConnection {
    fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::Acquire))
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.state() == ConnectionState::Closed {
            return Err(BrokerError::ConnectionClosed);
        }
        Ok(())
    }

    fn owned(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        self.owned.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connection for LocalConnection {
    fn start(&self) -> BrokerResult<()> {
        self.state
            .compare_exchange(
                ConnectionState::Created as u8,
                ConnectionState::Started as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .or_else(|current| match ConnectionState::from(current) {
                ConnectionState::Closed => Err(BrokerError::ConnectionClosed),
                _ => Ok(()),
            })
    }

    fn close(&self) -> BrokerResult<()> {
        let previous = self
            .state
            .swap(ConnectionState::Closed as u8, Ordering::AcqRel);
        if ConnectionState::from(previous) == ConnectionState::Closed {
            return Ok(());
        }

        let owned = std::mem::take(&mut *self.owned());
        for (destination, subscription) in &owned {
            if let Some(subs) = self.broker.destinations.get(destination) {
                subs.remove(subscription);
            }
        }

        tracing::debug!(
            connection_id = self.id,
            client_id = %self.client_id,
            subscriptions = owned.len(),
            "Broker connection closed"
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state() != ConnectionState::Closed
    }

    fn publish(&self, destination: &str, message: Message) -> BrokerResult<usize> {
        self.ensure_open()?;

        let listeners: Vec<Arc<dyn MessageListener>> = match self.broker.destinations.get(destination) {
            Some(subs) => subs
                .iter()
                .filter(|sub| sub.is_active() && message.matches(sub.selector.as_deref()))
                .map(|sub| sub.listener.clone())
                .collect(),
            None => Vec::new(),
        };

        for listener in &listeners {
            listener.on_message(&message);
        }
        Ok(listeners.len())
    }

    fn subscribe(
        &self,
        destination: &str,
        subscription: &str,
        selector: Option<&str>,
        listener: Arc<dyn MessageListener>,
    ) -> BrokerResult<()> {
        use dashmap::mapref::entry::Entry;

        self.ensure_open()?;

        let subs = self
            .broker
            .destinations
            .entry(destination.to_string())
            .or_default();

        match subs.entry(subscription.to_string()) {
            Entry::Occupied(_) => {
                return Err(BrokerError::DuplicateSubscription {
                    destination: destination.to_string(),
                    subscription: subscription.to_string(),
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(Subscription {
                    connection_id: self.id,
                    selector: selector.map(str::to_string),
                    listener,
                    connection_state: self.state.clone(),
                });
            }
        }
        drop(subs);

        self.owned()
            .push((destination.to_string(), subscription.to_string()));
        Ok(())
    }

    fn unsubscribe(&self, destination: &str, subscription: &str) -> BrokerResult<()> {
        self.ensure_open()?;

        let removed = self
            .broker
            .destinations
            .get(destination)
            .and_then(|subs| {
                subs.remove_if(subscription, |_, sub| sub.connection_id == self.id)
            });

        if removed.is_none() {
            return Err(BrokerError::UnknownSubscription {
                destination: destination.to_string(),
                subscription: subscription.to_string(),
            });
        }

        self.owned()
            .retain(|(d, s)| !(d == destination && s == subscription));
        Ok(())
    }
}
