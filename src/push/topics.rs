//! Topic registry.
//!
//! # Responsibilities
//! - Parse and validate topic keys (`subtopic@topic`)
//! - Hold the topics known to the application, created lazily
//! - Vet subscriptions (subtopic policy, listener veto)
//! - Publish data to a topic through the messaging connection
//!
//! # Design Decisions
//! - The registry is bound to one messaging connection; once that connection
//!   is closed every operation fails with `ConnectionClosed`
//! - Registry-wide listeners are attached to every topic, including topics
//!   created after the listener was added

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::metrics;
use crate::push::error::{PushError, PushResult};
use crate::push::messaging::MessagingContext;
use crate::push::session::SessionId;

const SUBTOPIC_SEPARATOR: char = '@';

/// Why a topic key string was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicKeyError {
    #[error("topic name is empty")]
    EmptyTopic,
    #[error("subtopic name is empty")]
    EmptySubtopic,
    #[error("'{0}' contains more than one '@'")]
    TooManySeparators(String),
    #[error("name '{0}' may not contain '@'")]
    SeparatorInName(String),
}

/// Address of a topic, optionally narrowed to a subtopic.
///
/// Written as `topic` or `subtopic@topic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicKey {
    topic_name: String,
    subtopic: Option<String>,
}

impl TopicKey {
    pub fn new(topic_name: &str, subtopic: Option<&str>) -> Result<Self, TopicKeyError> {
        let topic_name = topic_name.trim();
        if topic_name.is_empty() {
            return Err(TopicKeyError::EmptyTopic);
        }
        let subtopic = match subtopic.map(str::trim) {
            Some("") => return Err(TopicKeyError::EmptySubtopic),
            other => other.map(str::to_string),
        };
        for name in std::iter::once(topic_name).chain(subtopic.as_deref()) {
            if name.contains(SUBTOPIC_SEPARATOR) {
                return Err(TopicKeyError::SeparatorInName(name.to_string()));
            }
        }
        Ok(Self {
            topic_name: topic_name.to_string(),
            subtopic,
        })
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn subtopic(&self) -> Option<&str> {
        self.subtopic.as_deref()
    }
}

impl FromStr for TopicKey {
    type Err = TopicKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SUBTOPIC_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(topic), None, _) => TopicKey::new(topic, None),
            (Some(subtopic), Some(topic), None) => TopicKey::new(topic, Some(subtopic)),
            _ => Err(TopicKeyError::TooManySeparators(s.to_string())),
        }
    }
}

impl TryFrom<String> for TopicKey {
    type Error = TopicKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TopicKey> for String {
    fn from(key: TopicKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subtopic {
            Some(sub) => write!(f, "{}{}{}", sub, SUBTOPIC_SEPARATOR, self.topic_name),
            None => f.write_str(&self.topic_name),
        }
    }
}

/// A subscription refused by a topic or one of its listeners.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct SubscriptionFailure {
    pub reason: String,
}

impl SubscriptionFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Observer of subscription activity on a topic.
pub trait TopicListener: Send + Sync {
    /// Called before a session subscribes. Returning an error vetoes it.
    fn pre_subscribe(&self, _key: &TopicKey, _session: SessionId) -> Result<(), SubscriptionFailure> {
        Ok(())
    }

    fn subscribed(&self, _key: &TopicKey, _session: SessionId) {}

    fn unsubscribed(&self, _key: &TopicKey, _session: SessionId) {}
}

/// A named topic.
pub struct Topic {
    name: String,
    allow_subtopics: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn TopicListener>>>,
}

impl Topic {
    fn new(name: &str, listeners: Vec<Arc<dyn TopicListener>>) -> Self {
        Self {
            name: name.to_string(),
            allow_subtopics: AtomicBool::new(false),
            listeners: RwLock::new(listeners),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allows_subtopics(&self) -> bool {
        self.allow_subtopics.load(Ordering::Acquire)
    }

    pub fn set_allow_subtopics(&self, allow: bool) {
        self.allow_subtopics.store(allow, Ordering::Release);
    }

    pub fn add_listener(&self, listener: Arc<dyn TopicListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn TopicListener>> {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Decide whether `session` may subscribe to `key`.
    pub fn check_subscription(
        &self,
        key: &TopicKey,
        session: SessionId,
    ) -> Result<(), SubscriptionFailure> {
        if key.subtopic().is_some() && !self.allows_subtopics() {
            return Err(SubscriptionFailure::new(format!(
                "subtopics are not allowed for topic '{}'",
                self.name
            )));
        }
        for listener in self.listeners() {
            listener.pre_subscribe(key, session)?;
        }
        Ok(())
    }

    pub(crate) fn notify_subscribed(&self, key: &TopicKey, session: SessionId) {
        for listener in self.listeners() {
            listener.subscribed(key, session);
        }
    }

    pub(crate) fn notify_unsubscribed(&self, key: &TopicKey, session: SessionId) {
        for listener in self.listeners() {
            listener.unsubscribed(key, session);
        }
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("allow_subtopics", &self.allows_subtopics())
            .finish()
    }
}

/// Registry of topics backed by the messaging connection.
pub struct TopicsContext {
    messaging: Arc<MessagingContext>,
    topics: DashMap<String, Arc<Topic>>,
    listeners: RwLock<Vec<Arc<dyn TopicListener>>>,
}

impl TopicsContext {
    pub fn new(messaging: Arc<MessagingContext>) -> Self {
        Self {
            messaging,
            topics: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    fn ensure_open(&self) -> PushResult<()> {
        if self.messaging.is_open() {
            Ok(())
        } else {
            Err(PushError::ConnectionClosed)
        }
    }

    /// Return the topic named by `key`, creating it if needed.
    pub fn get_or_create_topic(&self, key: &TopicKey) -> PushResult<Arc<Topic>> {
        self.ensure_open()?;

        // Lock order: registry listeners, then the topic map.
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let topic = self
            .topics
            .entry(key.topic_name().to_string())
            .or_insert_with(|| {
                tracing::info!(topic = %key.topic_name(), "Topic created");
                Arc::new(Topic::new(key.topic_name(), listeners.clone()))
            })
            .value()
            .clone();
        Ok(topic)
    }

    /// Return an existing topic.
    pub fn get_topic(&self, key: &TopicKey) -> PushResult<Arc<Topic>> {
        self.ensure_open()?;
        self.topics
            .get(key.topic_name())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PushError::UnknownTopic(key.topic_name().to_string()))
    }

    /// Forget a topic. Existing subscriptions are not touched.
    pub fn remove_topic(&self, key: &TopicKey) -> PushResult<Option<Arc<Topic>>> {
        self.ensure_open()?;
        Ok(self.topics.remove(key.topic_name()).map(|(_, topic)| topic))
    }

    /// Attach a listener to every current and future topic.
    pub fn add_topic_listener(&self, listener: Arc<dyn TopicListener>) -> PushResult<()> {
        self.ensure_open()?;
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(listener.clone());
        for topic in self.topics.iter() {
            topic.add_listener(listener.clone());
        }
        Ok(())
    }

    /// Names of all known topics, sorted.
    pub fn topic_names(&self) -> PushResult<Vec<String>> {
        self.ensure_open()?;
        let mut names: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    /// All known topics, sorted by name.
    pub fn topics(&self) -> PushResult<Vec<Arc<Topic>>> {
        self.ensure_open()?;
        let mut topics: Vec<Arc<Topic>> = self.topics.iter().map(|e| e.value().clone()).collect();
        topics.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(topics)
    }

    /// Publish `data` to `key`, returning the number of sessions reached.
    pub fn publish(&self, key: &TopicKey, data: serde_json::Value) -> PushResult<usize> {
        let topic = self.get_topic(key)?;
        if key.subtopic().is_some() && !topic.allows_subtopics() {
            return Err(SubscriptionFailure::new(format!(
                "subtopics are not allowed for topic '{}'",
                topic.name()
            ))
            .into());
        }

        let delivered = self.messaging.publish(key, data)?;
        metrics::record_publish(key.topic_name(), delivered);
        tracing::debug!(topic = %key, delivered, "Published message");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::messaging::tests::started_messaging;
    use serde_json::json;

    fn key(raw: &str) -> TopicKey {
        raw.parse().unwrap()
    }

    #[test]
    fn test_topic_key_parsing() {
        let plain = key("chat");
        assert_eq!(plain.topic_name(), "chat");
        assert_eq!(plain.subtopic(), None);

        let sub = key("room1@chat");
        assert_eq!(sub.topic_name(), "chat");
        assert_eq!(sub.subtopic(), Some("room1"));
        assert_eq!(sub.to_string(), "room1@chat");

        assert_eq!("".parse::<TopicKey>(), Err(TopicKeyError::EmptyTopic));
        assert_eq!("a@".parse::<TopicKey>(), Err(TopicKeyError::EmptyTopic));
        assert_eq!("@chat".parse::<TopicKey>(), Err(TopicKeyError::EmptySubtopic));
        assert!(matches!(
            "a@b@c".parse::<TopicKey>(),
            Err(TopicKeyError::TooManySeparators(_))
        ));
        assert_eq!(
            TopicKey::new("a@b", None),
            Err(TopicKeyError::SeparatorInName("a@b".into()))
        );
    }

    #[test]
    fn test_topic_key_serde() {
        let parsed: Vec<TopicKey> = serde_json::from_value(json!(["x@chat", "news"])).unwrap();
        assert_eq!(parsed[0], key("x@chat"));
        assert_eq!(serde_json::to_value(&parsed[1]).unwrap(), json!("news"));
        assert!(serde_json::from_value::<TopicKey>(json!("@bad")).is_err());
    }

    struct Deny;

    impl TopicListener for Deny {
        fn pre_subscribe(&self, key: &TopicKey, _session: SessionId) -> Result<(), SubscriptionFailure> {
            if key.subtopic() == Some("private") {
                Err(SubscriptionFailure::new("private room"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_check_subscription() {
        let (_broker, messaging) = started_messaging();
        let topics = TopicsContext::new(messaging);
        let session = SessionId::new();

        let topic = topics.get_or_create_topic(&key("chat")).unwrap();
        assert!(topic.check_subscription(&key("chat"), session).is_ok());
        assert!(topic.check_subscription(&key("room@chat"), session).is_err());

        topic.set_allow_subtopics(true);
        topics.add_topic_listener(Arc::new(Deny)).unwrap();
        assert!(topic.check_subscription(&key("room@chat"), session).is_ok());
        assert_eq!(
            topic.check_subscription(&key("private@chat"), session),
            Err(SubscriptionFailure::new("private room"))
        );

        // listeners reach topics created later as well
        let news = topics.get_or_create_topic(&key("news")).unwrap();
        news.set_allow_subtopics(true);
        assert!(news.check_subscription(&key("private@news"), session).is_err());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (_broker, messaging) = started_messaging();
        let topics = TopicsContext::new(messaging);

        let a = topics.get_or_create_topic(&key("chat")).unwrap();
        let b = topics.get_or_create_topic(&key("room@chat")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(topics.topic_names().unwrap(), vec!["chat".to_string()]);

        assert!(topics.remove_topic(&key("chat")).unwrap().is_some());
        assert!(matches!(
            topics.get_topic(&key("chat")),
            Err(PushError::UnknownTopic(_))
        ));
    }

    #[test]
    fn test_publish_rules() {
        let (_broker, messaging) = started_messaging();
        let topics = TopicsContext::new(messaging.clone());

        assert!(matches!(
            topics.publish(&key("missing"), json!(1)),
            Err(PushError::UnknownTopic(_))
        ));

        topics.get_or_create_topic(&key("chat")).unwrap();
        assert_eq!(topics.publish(&key("chat"), json!(1)).unwrap(), 0);
        assert!(matches!(
            topics.publish(&key("room@chat"), json!(1)),
            Err(PushError::SubscriptionRejected(_))
        ));

        messaging.stop().unwrap();
        assert!(matches!(
            topics.publish(&key("chat"), json!(1)),
            Err(PushError::ConnectionClosed)
        ));
        assert!(matches!(
            topics.get_or_create_topic(&key("other")),
            Err(PushError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_closed_registry_refuses_listing_and_changes() {
        let (_broker, messaging) = started_messaging();
        let topics = TopicsContext::new(messaging.clone());
        topics.get_or_create_topic(&key("news")).unwrap();

        messaging.stop().unwrap();
        assert!(matches!(topics.topic_names(), Err(PushError::ConnectionClosed)));
        assert!(matches!(topics.topics(), Err(PushError::ConnectionClosed)));
        assert!(matches!(
            topics.remove_topic(&key("news")),
            Err(PushError::ConnectionClosed)
        ));
        assert!(matches!(
            topics.add_topic_listener(Arc::new(Deny)),
            Err(PushError::ConnectionClosed)
        ));
    }
}
