//! Connection traits.

use std::sync::Arc;

use crate::broker::{BrokerResult, Credentials, Message};

/// Receives messages delivered to a subscription.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: &Message);
}

/// Opens connections to a broker.
pub trait ConnectionFactory: Send + Sync {
    /// Open a connection.
    ///
    /// Credentials are passed through as given, empty ones included; whether
    /// they are acceptable is the broker's decision.
    fn create_connection(
        &self,
        credentials: &Credentials,
        client_id: &str,
    ) -> BrokerResult<Arc<dyn Connection>>;
}

/// A live connection to a broker.
///
/// Messages are only delivered to subscriptions once the connection is
/// started. Every operation on a closed connection fails with
/// [`BrokerError::ConnectionClosed`](crate::broker::BrokerError::ConnectionClosed),
/// except `close` itself which is idempotent.
pub trait Connection: Send + Sync {
    /// Begin delivery.
    fn start(&self) -> BrokerResult<()>;

    /// Close the connection and drop all subscriptions it owns.
    fn close(&self) -> BrokerResult<()>;

    fn is_open(&self) -> bool;

    /// Publish to a destination, returning the number of deliveries made.
    fn publish(&self, destination: &str, message: Message) -> BrokerResult<usize>;

    /// Register a named subscription on a destination.
    fn subscribe(
        &self,
        destination: &str,
        subscription: &str,
        selector: Option<&str>,
        listener: Arc<dyn MessageListener>,
    ) -> BrokerResult<()>;

    /// Remove a named subscription.
    fn unsubscribe(&self, destination: &str, subscription: &str) -> BrokerResult<()>;
}
