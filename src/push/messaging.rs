//! Messaging context.
//!
//! # Responsibilities
//! - Resolve the connection factory and topic namespace by name
//! - Open, start and close the single broker connection
//! - Map topic keys to broker destinations and subscriptions
//!
//! # Design Decisions
//! - Only this type closes the connection
//! - Destination = `<namespace>/<topic>`, subtopic becomes the selector
//! - Subscription names embed the application name and session id so that
//!   several deployments can share a broker

use std::sync::{Arc, Weak};

use crate::broker::{BrokerResult, Connection, Message, MessageListener};
use crate::config::PushSettings;
use crate::naming::{NameParser, NamingContext};
use crate::push::error::{PushResult, StartupError};
use crate::push::session::{Session, SessionId};
use crate::push::topics::TopicKey;

/// The broker connection and the naming around it.
pub struct MessagingContext {
    connection: Arc<dyn Connection>,
    topics_namespace: String,
    application_name: String,
}

impl MessagingContext {
    /// Look up the factory and namespace, then open a connection.
    ///
    /// The connection is not started.
    pub fn connect(
        naming: &dyn NamingContext,
        settings: &PushSettings,
    ) -> Result<Self, StartupError> {
        let parser = NameParser;
        let factory_name = parser.parse(&settings.connection_factory)?;
        let namespace_name = parser.parse(&settings.topics_namespace)?;

        let factory = naming.lookup_connection_factory(&factory_name)?;
        let topics_namespace = naming.lookup_topic_namespace(&namespace_name)?;

        let connection =
            factory.create_connection(&settings.credentials(), &settings.application_name)?;

        tracing::debug!(
            connection_factory = %factory_name,
            topics_namespace = %topics_namespace,
            application = %settings.application_name,
            "Messaging connection opened"
        );

        Ok(Self::new(
            connection,
            topics_namespace,
            settings.application_name.clone(),
        ))
    }

    pub fn new(
        connection: Arc<dyn Connection>,
        topics_namespace: String,
        application_name: String,
    ) -> Self {
        Self {
            connection,
            topics_namespace,
            application_name,
        }
    }

    /// Begin message delivery.
    pub fn start(&self) -> BrokerResult<()> {
        self.connection.start()
    }

    /// Close the connection.
    pub fn stop(&self) -> BrokerResult<()> {
        self.connection.close()
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Broker destination for a topic.
    pub fn destination(&self, key: &TopicKey) -> String {
        let namespace = self.topics_namespace.trim_end_matches('/');
        if namespace.is_empty() {
            key.topic_name().to_string()
        } else {
            format!("{}/{}", namespace, key.topic_name())
        }
    }

    fn subscription_name(&self, session: SessionId, key: &TopicKey) -> String {
        format!("{}:{}:{}", self.application_name, session, key)
    }

    pub fn publish(&self, key: &TopicKey, data: serde_json::Value) -> PushResult<usize> {
        let message = Message::new(key.subtopic().map(str::to_string), data);
        Ok(self.connection.publish(&self.destination(key), message)?)
    }

    /// Route messages for `key` into `session`.
    pub fn subscribe(&self, session: &Arc<Session>, key: &TopicKey) -> PushResult<()> {
        let listener = Arc::new(SessionListener {
            session: Arc::downgrade(session),
            key: key.clone(),
        });
        self.connection.subscribe(
            &self.destination(key),
            &self.subscription_name(session.id(), key),
            key.subtopic(),
            listener,
        )?;
        Ok(())
    }

    pub fn unsubscribe(&self, session: SessionId, key: &TopicKey) -> PushResult<()> {
        self.connection
            .unsubscribe(&self.destination(key), &self.subscription_name(session, key))?;
        Ok(())
    }
}

/// Feeds broker deliveries for one topic key into a session queue.
struct SessionListener {
    session: Weak<Session>,
    key: TopicKey,
}

impl MessageListener for SessionListener {
    fn on_message(&self, message: &Message) {
        if let Some(session) = self.session.upgrade() {
            session.enqueue(&self.key, message.body.clone());
        }
    }
}
